//! STL decoding for binary and ASCII files
use std::path::Path;

use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::config::{FileSettings, MeshSettings};
use crate::error::MeshError;
use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, MeshError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(MeshError::TooSmall);
    }

    let body = &data[HEADER_LEN..];
    let triangle_count = read_u32(body, 0) as usize;
    let facets = &body[4..];

    let available = facets.len() / FACET_LEN;
    if available < triangle_count {
        return Err(MeshError::UnexpectedEof {
            parsed: available,
            expected: triangle_count,
        });
    }

    let mut mesh = Mesh::with_capacity(triangle_count);
    for facet in facets.chunks_exact(FACET_LEN).take(triangle_count) {
        let [nx, ny, nz] = read_vec3(facet, 0);
        let vertex = |offset: usize| {
            let [x, y, z] = read_vec3(facet, offset);
            Vertex::new(x, y, z, nx, ny, nz)
        };
        // trailing 2 bytes are the attribute byte count
        mesh.add_triangle(Triangle::new(vertex(12), vertex(24), vertex(36)));
    }

    Ok(mesh)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_vec3(data: &[u8], offset: usize) -> [f32; 3] {
    [0, 4, 8].map(|i| f32::from_bits(read_u32(data, offset + i)))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, MeshError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(MeshError::Ascii(format!("{:?}", e))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = not_line_ending(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }

    Ok((input, mesh))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh, MeshError> {
    // Binary files may also start with "solid", so fall back on failure
    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(mesh) = parse_ascii_stl(text) {
                return Ok(mesh);
            }
        }
    }

    parse_binary_stl(data)
}

/// Read, decode and validate a mesh file from disk.
pub fn load_mesh_file(
    path: &Path,
    files: &FileSettings,
    limits: &MeshSettings,
) -> Result<Mesh, MeshError> {
    if !files.is_supported(path) {
        return Err(MeshError::UnsupportedExtension {
            path: path.to_path_buf(),
        });
    }

    let io_err = |source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > files.max_file_size {
        return Err(MeshError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit: files.max_file_size,
        });
    }

    let data = std::fs::read(path).map_err(io_err)?;
    let mesh = parse_stl(&data)?;
    mesh.validate(limits)?;
    Ok(mesh)
}
