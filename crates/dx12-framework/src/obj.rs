//! Wavefront OBJ reader for position/normal meshes.
//!
//! Supports `v`, `vn` and `f` records; everything else (`vt`, `o`, `g`,
//! `usemtl`, comments) is skipped. Polygons are fan-triangulated and vertices
//! are deduplicated on their `(position, normal)` index pair.

use std::collections::HashMap;
use std::path::Path;

use eyre::eyre;
use eyre::WrapErr;
use tracing::info;

use crate::error::FrameResult;
use crate::geometry::MeshData;
use crate::geometry::Vertex;

const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

#[derive(Debug, Clone, Copy)]
pub struct ObjOptions {
    /// Negate Z and reverse winding so right-handed exports render correctly
    /// in a left-handed view.
    pub convert_to_left_handed: bool,
}

impl Default for ObjOptions {
    fn default() -> Self {
        Self {
            convert_to_left_handed: true,
        }
    }
}

pub fn load_obj(path: impl AsRef<Path>, options: ObjOptions) -> FrameResult<MeshData> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to open mesh {}", path.display()))?;
    let mesh = parse_obj(&source, options)
        .map_err(|report| report.into_report().wrap_err(format!("in mesh {}", path.display())))?;
    info!(
        path = %path.display(),
        vertices = mesh.vertices.len(),
        triangles = mesh.indices.len() / 3,
        "mesh loaded"
    );
    Ok(mesh)
}

pub fn parse_obj(source: &str, options: ObjOptions) -> FrameResult<MeshData> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut unique: HashMap<(usize, Option<usize>), u32> = HashMap::new();
    let mut mesh = MeshData::default();

    for (line_index, line) in source.lines().enumerate() {
        let line_number = line_index + 1;
        let mut fields = line.split_whitespace();
        let Some(tag) = fields.next() else {
            continue;
        };
        match tag {
            "v" | "vn" => {
                let mut xyz = parse_vec3(&mut fields)
                    .ok_or_else(|| eyre!("line {line_number}: `{tag}` needs three numbers"))?;
                if options.convert_to_left_handed {
                    xyz[2] = -xyz[2];
                }
                if tag == "v" {
                    positions.push(xyz);
                } else {
                    normals.push(xyz);
                }
            }
            "f" => {
                let corners = fields
                    .map(|token| {
                        let (v, vn) = parse_face_token(token).ok_or_else(|| {
                            eyre!("line {line_number}: malformed face token `{token}`")
                        })?;
                        let v = resolve_index(v, positions.len()).ok_or_else(|| {
                            eyre!("line {line_number}: position index {v} out of range")
                        })?;
                        let vn = match vn {
                            Some(vn) => Some(resolve_index(vn, normals.len()).ok_or_else(|| {
                                eyre!("line {line_number}: normal index {vn} out of range")
                            })?),
                            None => None,
                        };
                        Ok::<_, eyre::Report>((v, vn))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    continue;
                }

                let mut index_of = |key: (usize, Option<usize>)| -> u32 {
                    *unique.entry(key).or_insert_with(|| {
                        let (v, vn) = key;
                        let normal = vn.map_or(DEFAULT_NORMAL, |vn| normals[vn]);
                        mesh.vertices.push(Vertex::new(positions[v], normal));
                        (mesh.vertices.len() - 1) as u32
                    })
                };

                let first = index_of(corners[0]);
                for pair in corners[1..].windows(2) {
                    let second = index_of(pair[0]);
                    let third = index_of(pair[1]);
                    if options.convert_to_left_handed {
                        mesh.indices.extend([first, third, second]);
                    } else {
                        mesh.indices.extend([first, second, third]);
                    }
                }
            }
            _ => {}
        }
    }

    if mesh.vertices.is_empty() || mesh.indices.is_empty() {
        return Err(eyre!("mesh contains no triangles").into());
    }
    Ok(mesh)
}

fn parse_vec3<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let mut xyz = [0.0; 3];
    for slot in &mut xyz {
        *slot = fields.next()?.parse().ok()?;
    }
    Some(xyz)
}

/// `v`, `v/vt`, `v/vt/vn` or `v//vn`. Texture coordinates are ignored.
fn parse_face_token(token: &str) -> Option<(i64, Option<i64>)> {
    let mut parts = token.split('/');
    let v = parts.next()?.parse().ok()?;
    let _vt = parts.next();
    let vn = match parts.next() {
        Some("") | None => None,
        Some(vn) => Some(vn.parse().ok()?),
    };
    if parts.next().is_some() {
        return None;
    }
    Some((v, vn))
}

/// One-based OBJ index (negative counts back from the newest element) to a
/// zero-based slot.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = match index {
        0 => return None,
        i if i > 0 => i - 1,
        i => len as i64 + i,
    };
    usize::try_from(resolved).ok().filter(|&slot| slot < len)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# two triangles sharing an edge
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1
f 1//1 3//1 4//1
";

    fn right_handed() -> ObjOptions {
        ObjOptions {
            convert_to_left_handed: false,
        }
    }

    #[test]
    fn shared_edge_vertices_are_deduplicated() {
        let mesh = parse_obj(QUAD, ObjOptions::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn left_handed_conversion_flips_z_and_winding() {
        let mesh = parse_obj(QUAD, ObjOptions::default()).unwrap();
        assert_eq!(mesh.indices[..3], [0, 2, 1]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, -1.0]);

        let mesh = parse_obj(QUAD, right_handed()).unwrap();
        assert_eq!(mesh.indices[..3], [0, 1, 2]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn polygons_are_fan_triangulated() {
        let source = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv -1 1 0\nf 1 2 3 4 5\n";
        let mesh = parse_obj(source, right_handed()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }

    #[test]
    fn missing_normals_default_to_up() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 3/1\n";
        let mesh = parse_obj(source, right_handed()).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == DEFAULT_NORMAL));
    }

    #[test]
    fn negative_indices_count_back() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf -3//-1 -2//-1 -1//-1\n";
        let mesh = parse_obj(source, right_handed()).unwrap();
        assert_eq!(mesh.vertices[2].position, [0.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[2].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn same_position_with_different_normals_stays_distinct() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 -1\n\
                      f 1//1 2//1 3//1\nf 1//2 3//2 2//2\n";
        let mesh = parse_obj(source, right_handed()).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse_obj("v 0 0\n", right_handed()).is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n", right_handed()).is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 0\n", right_handed()).is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 x\n", right_handed()).is_err());
    }

    #[test]
    fn empty_mesh_is_an_error() {
        assert!(parse_obj("# nothing here\nv 0 0 0\n", right_handed()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let error = load_obj("/no/such/mesh.obj", ObjOptions::default()).unwrap_err();
        assert!(format!("{error}").contains("mesh.obj"), "{error}");
    }
}
