use eyre::eyre;

use crate::error::FrameResult;

/// Usage role a GPU resource is in. Mirrors the subset of
/// `D3D12_RESOURCE_STATES` this framework moves resources through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Common,
    Present,
    RenderTarget,
    DepthWrite,
    CopyDest,
    GenericRead,
    VertexAndConstantBuffer,
    IndexBuffer,
}

/// A recorded before/after pair, ready to become a barrier command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub before: ResourceState,
    pub after: ResourceState,
}

/// CPU-side shadow of one resource's state as of the end of the commands
/// recorded so far. Refuses transitions that start from the wrong state.
#[derive(Debug, Clone)]
pub struct StateTracker {
    name: &'static str,
    state: ResourceState,
}

impl StateTracker {
    pub fn new(name: &'static str, initial: ResourceState) -> Self {
        Self {
            name,
            state: initial,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn transition(
        &mut self,
        before: ResourceState,
        after: ResourceState,
    ) -> FrameResult<Transition> {
        if self.state != before {
            return Err(eyre!(
                "{} is in {:?}, cannot transition from {:?} to {:?}",
                self.name,
                self.state,
                before,
                after
            )
            .into());
        }
        if before == after {
            return Err(eyre!("{} transition {:?} -> {:?} is a no-op", self.name, before, after).into());
        }
        self.state = after;
        Ok(Transition { before, after })
    }

    /// Transitions from whatever state the resource is currently in.
    pub fn transition_to(&mut self, after: ResourceState) -> FrameResult<Transition> {
        self.transition(self.state, after)
    }

    /// Forgets the tracked state, used when the underlying resource is replaced
    /// (swapchain buffers come back in `Present` after a resize).
    pub fn reset(&mut self, state: ResourceState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_buffer_round_trip() {
        let mut tracker = StateTracker::new("back buffer 0", ResourceState::Present);
        let to_rt = tracker
            .transition(ResourceState::Present, ResourceState::RenderTarget)
            .unwrap();
        assert_eq!(to_rt.after, ResourceState::RenderTarget);
        let back = tracker
            .transition(ResourceState::RenderTarget, ResourceState::Present)
            .unwrap();
        assert_eq!(back.before, ResourceState::RenderTarget);
        assert_eq!(tracker.state(), ResourceState::Present);
    }

    #[test]
    fn wrong_before_state_is_rejected_and_state_kept() {
        let mut tracker = StateTracker::new("back buffer 1", ResourceState::Present);
        let error = tracker
            .transition(ResourceState::RenderTarget, ResourceState::Present)
            .unwrap_err();
        assert!(format!("{error}").contains("back buffer 1"));
        assert_eq!(tracker.state(), ResourceState::Present);
    }

    #[test]
    fn no_op_transition_is_rejected() {
        let mut tracker = StateTracker::new("vertex buffer", ResourceState::CopyDest);
        assert!(tracker.transition_to(ResourceState::CopyDest).is_err());
        tracker
            .transition_to(ResourceState::VertexAndConstantBuffer)
            .unwrap();
        assert_eq!(tracker.state(), ResourceState::VertexAndConstantBuffer);
    }
}
