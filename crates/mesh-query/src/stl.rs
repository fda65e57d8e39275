//! STL read/write, binary and ASCII.
//!
//! Binary layout: 80-byte header, u32 triangle count (LE), then per
//! triangle 3×f32 normal + 3×(3×f32 vertex) + u16 attribute = 50 bytes.
//! Files starting with `solid` whose size does not match the binary layout
//! are parsed as ASCII.

use std::path::Path;

use nalgebra::Point3;

use crate::error::MeshLoadError;
use crate::mesh::TriMesh;

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

pub type Triangle = [Point3<f64>; 3];

pub fn read_stl(path: &Path) -> Result<Vec<Triangle>, MeshLoadError> {
    let bytes = std::fs::read(path).map_err(|source| MeshLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stl(&bytes)
}

pub fn parse_stl(bytes: &[u8]) -> Result<Vec<Triangle>, MeshLoadError> {
    if bytes.len() >= HEADER_SIZE + 4 {
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
        if HEADER_SIZE + 4 + count * TRIANGLE_SIZE == bytes.len() {
            return parse_binary(bytes, count);
        }
    }
    let text = std::str::from_utf8(bytes).map_err(|_| MeshLoadError::Parse {
        reason: "not a binary STL and not valid UTF-8 text".to_string(),
    })?;
    if !text.trim_start().starts_with("solid") {
        return Err(MeshLoadError::Parse {
            reason: "missing `solid` header".to_string(),
        });
    }
    parse_ascii(text)
}

fn parse_binary(bytes: &[u8], count: usize) -> Result<Vec<Triangle>, MeshLoadError> {
    let read_f32 = |at: usize| f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let mut triangles = Vec::with_capacity(count);
    for i in 0..count {
        // Skip the stored normal; winding is authoritative.
        let base = HEADER_SIZE + 4 + i * TRIANGLE_SIZE + 12;
        let mut tri = [Point3::origin(); 3];
        for (k, vertex) in tri.iter_mut().enumerate() {
            let at = base + k * 12;
            *vertex = Point3::new(
                f64::from(read_f32(at)),
                f64::from(read_f32(at + 4)),
                f64::from(read_f32(at + 8)),
            );
        }
        triangles.push(tri);
    }
    Ok(triangles)
}

fn parse_ascii(text: &str) -> Result<Vec<Triangle>, MeshLoadError> {
    let mut triangles = Vec::new();
    let mut pending: Vec<Point3<f64>> = Vec::with_capacity(3);
    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let coords: Vec<f64> = tokens
                    .map(str::parse::<f64>)
                    .collect::<Result<_, _>>()
                    .map_err(|e| MeshLoadError::Parse {
                        reason: format!("line {}: {e}", line_no + 1),
                    })?;
                if coords.len() != 3 {
                    return Err(MeshLoadError::Parse {
                        reason: format!("line {}: expected 3 coordinates", line_no + 1),
                    });
                }
                pending.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("endloop") => {
                if pending.len() != 3 {
                    return Err(MeshLoadError::Parse {
                        reason: format!("line {}: facet with {} vertices", line_no + 1, pending.len()),
                    });
                }
                triangles.push([pending[0], pending[1], pending[2]]);
                pending.clear();
            }
            _ => {}
        }
    }
    Ok(triangles)
}

/// Encode a mesh as binary STL. Normals are recomputed from winding.
pub fn write_binary_stl(mesh: &TriMesh, name: &str) -> Vec<u8> {
    let count = mesh.triangle_count();
    let mut buf = Vec::with_capacity(HEADER_SIZE + 4 + count * TRIANGLE_SIZE);

    let header = format!("binary STL: {name}");
    let header_bytes = header.as_bytes();
    buf.extend_from_slice(&header_bytes[..header_bytes.len().min(HEADER_SIZE)]);
    buf.resize(HEADER_SIZE, 0u8);
    buf.extend_from_slice(&(count as u32).to_le_bytes());

    for i in 0..count {
        let n = mesh.face_normal(i);
        for c in [n.x, n.y, n.z] {
            buf.extend_from_slice(&(c as f32).to_le_bytes());
        }
        for p in mesh.triangle(i) {
            for c in [p.x, p.y, p.z] {
                buf.extend_from_slice(&(c as f32).to_le_bytes());
            }
        }
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
    buf
}

pub fn write_ascii_stl(mesh: &TriMesh, name: &str) -> String {
    let mut out = String::with_capacity(mesh.triangle_count() * 256);
    out.push_str(&format!("solid {name}\n"));
    for i in 0..mesh.triangle_count() {
        let n = mesh.face_normal(i);
        out.push_str(&format!("  facet normal {} {} {}\n", n.x, n.y, n.z));
        out.push_str("    outer loop\n");
        for p in mesh.triangle(i) {
            out.push_str(&format!("      vertex {} {} {}\n", p.x, p.y, p.z));
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }
    out.push_str(&format!("endsolid {name}\n"));
    out
}

/// Write a binary STL file.
pub fn save_stl(path: &Path, mesh: &TriMesh, name: &str) -> Result<(), MeshLoadError> {
    std::fs::write(path, write_binary_stl(mesh, name)).map_err(|source| MeshLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
