// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! PLY point cloud reader/writer
//!
//! Only the vertex element is read and it has to be the first element in the
//! file. `x`, `y` and `z` may use any scalar type; other vertex properties
//! are skipped.

use crate::geometry::PointSet;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Errors raised while reading or writing PLY files
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    #[error("failed to access PLY data: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing 'ply' magic line")]
    NotPly,

    #[error("unsupported PLY format '{0}'")]
    UnsupportedFormat(String),

    #[error("unsupported property type '{0}'")]
    UnsupportedType(String),

    #[error("malformed header line '{0}'")]
    MalformedHeader(String),

    #[error("vertex element must come first, found element '{0}'")]
    VertexNotFirst(String),

    #[error("no vertex element in header")]
    MissingVertexElement,

    #[error("vertex element has no '{0}' property")]
    MissingCoordinate(&'static str),

    #[error("list property '{0}' on the vertex element is not supported")]
    ListProperty(String),

    #[error("vertex {index}: {reason}")]
    BadVertex { index: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    fn parse(name: &str) -> Result<Self, PlyError> {
        match name {
            "char" | "int8" => Ok(Self::Int8),
            "uchar" | "uint8" => Ok(Self::UInt8),
            "short" | "int16" => Ok(Self::Int16),
            "ushort" | "uint16" => Ok(Self::UInt16),
            "int" | "int32" => Ok(Self::Int32),
            "uint" | "uint32" => Ok(Self::UInt32),
            "float" | "float32" => Ok(Self::Float32),
            "double" | "float64" => Ok(Self::Float64),
            other => Err(PlyError::UnsupportedType(other.to_string())),
        }
    }

    fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    fn decode(self, bytes: &[u8], big_endian: bool) -> f64 {
        macro_rules! num {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&bytes[..$n]);
                if big_endian {
                    <$t>::from_be_bytes(buf) as f64
                } else {
                    <$t>::from_le_bytes(buf) as f64
                }
            }};
        }

        match self {
            Self::Int8 => num!(i8, 1),
            Self::UInt8 => num!(u8, 1),
            Self::Int16 => num!(i16, 2),
            Self::UInt16 => num!(u16, 2),
            Self::Int32 => num!(i32, 4),
            Self::UInt32 => num!(u32, 4),
            Self::Float32 => num!(f32, 4),
            Self::Float64 => num!(f64, 8),
        }
    }
}

#[derive(Debug)]
struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    properties: Vec<(String, ScalarType)>,
}

impl PlyHeader {
    fn coordinate_indices(&self) -> Result<[usize; 3], PlyError> {
        let find = |axis: &'static str| {
            self.properties
                .iter()
                .position(|(name, _)| name == axis)
                .ok_or(PlyError::MissingCoordinate(axis))
        };
        Ok([find("x")?, find("y")?, find("z")?])
    }

    fn record_size(&self) -> usize {
        self.properties.iter().map(|(_, ty)| ty.size()).sum()
    }
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 || line.trim() != "ply" {
        return Err(PlyError::NotPly);
    }

    let mut format = None;
    let mut vertex_count = None;
    let mut in_vertex = false;
    let mut seen_element = false;
    let mut properties = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(PlyError::MalformedHeader("missing end_header".to_string()));
        }
        let trimmed = line.trim();
        let parts: Vec<&str> = trimmed.split_whitespace().collect();

        match parts.as_slice() {
            ["end_header"] => break,
            [] | ["comment", ..] | ["obj_info", ..] => {}
            ["format", kind, _version] => {
                format = Some(match *kind {
                    "ascii" => PlyFormat::Ascii,
                    "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                    "binary_big_endian" => PlyFormat::BinaryBigEndian,
                    other => return Err(PlyError::UnsupportedFormat(other.to_string())),
                });
            }
            ["element", name, count] => {
                if !seen_element && *name != "vertex" {
                    return Err(PlyError::VertexNotFirst(name.to_string()));
                }
                in_vertex = *name == "vertex";
                seen_element = true;
                if in_vertex {
                    let count = count
                        .parse()
                        .map_err(|_| PlyError::MalformedHeader(trimmed.to_string()))?;
                    vertex_count = Some(count);
                }
            }
            ["property", "list", .., name] if in_vertex => {
                return Err(PlyError::ListProperty(name.to_string()));
            }
            ["property", ty, name] if in_vertex => {
                properties.push((name.to_string(), ScalarType::parse(ty)?));
            }
            ["property", ..] => {}
            _ => return Err(PlyError::MalformedHeader(trimmed.to_string())),
        }
    }

    let format = format.ok_or_else(|| PlyError::MalformedHeader("missing format".to_string()))?;
    let vertex_count = vertex_count.ok_or(PlyError::MissingVertexElement)?;

    Ok(PlyHeader {
        format,
        vertex_count,
        properties,
    })
}

/// Read the vertex positions of a PLY stream
pub fn read_ply_from<R: BufRead>(mut reader: R) -> Result<PointSet, PlyError> {
    let header = parse_header(&mut reader)?;
    let [ix, iy, iz] = header.coordinate_indices()?;
    let mut points = Vec::with_capacity(header.vertex_count);

    match header.format {
        PlyFormat::Ascii => {
            let mut line = String::new();
            for index in 0..header.vertex_count {
                line.clear();
                if reader.read_line(&mut line)? == 0 {
                    return Err(PlyError::BadVertex {
                        index,
                        reason: "unexpected end of file".to_string(),
                    });
                }
                let values = line
                    .split_whitespace()
                    .map(str::parse::<f64>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| PlyError::BadVertex {
                        index,
                        reason: e.to_string(),
                    })?;
                if values.len() < header.properties.len() {
                    return Err(PlyError::BadVertex {
                        index,
                        reason: format!(
                            "expected {} values, found {}",
                            header.properties.len(),
                            values.len()
                        ),
                    });
                }
                points.push(Point3::new(values[ix], values[iy], values[iz]));
            }
        }
        PlyFormat::BinaryLittleEndian | PlyFormat::BinaryBigEndian => {
            let big_endian = header.format == PlyFormat::BinaryBigEndian;
            let offsets: Vec<usize> = header
                .properties
                .iter()
                .scan(0, |offset, (_, ty)| {
                    let start = *offset;
                    *offset += ty.size();
                    Some(start)
                })
                .collect();
            let types: Vec<ScalarType> = header.properties.iter().map(|(_, ty)| *ty).collect();
            let coord = |record: &[u8], i: usize| types[i].decode(&record[offsets[i]..], big_endian);

            let mut record = vec![0u8; header.record_size()];
            for index in 0..header.vertex_count {
                reader
                    .read_exact(&mut record)
                    .map_err(|e| PlyError::BadVertex {
                        index,
                        reason: e.to_string(),
                    })?;
                points.push(Point3::new(
                    coord(&record, ix),
                    coord(&record, iy),
                    coord(&record, iz),
                ));
            }
        }
    }

    Ok(PointSet::new(points))
}

/// Read the vertex positions of a PLY file
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointSet, PlyError> {
    let file = File::open(path)?;
    read_ply_from(BufReader::new(file))
}

/// Write points as an ASCII PLY stream with `double` coordinates
pub fn write_ply_to<W: Write>(mut writer: W, points: &PointSet) -> Result<(), PlyError> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", points.len())?;
    writeln!(writer, "property double x")?;
    writeln!(writer, "property double y")?;
    writeln!(writer, "property double z")?;
    writeln!(writer, "end_header")?;
    for p in points.points() {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write points to an ASCII PLY file, creating parent directories
pub fn write_ply(path: impl AsRef<Path>, points: &PointSet) -> Result<(), PlyError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_ply_to(BufWriter::new(File::create(path)?), points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ascii_roundtrip_is_lossless() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cloud.ply");
        let points = PointSet::from_rows(&[[0.1, -2.5, 3.0], [1.0 / 3.0, 0.0, 1e-9]]);

        write_ply(&path, &points).unwrap();
        assert_eq!(read_ply(&path).unwrap(), points);
    }

    #[test]
    fn test_binary_little_endian_with_extra_properties() {
        let mut data = b"ply\nformat binary_little_endian 1.0\ncomment scan\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nelement face 0\nproperty list uchar int vertex_indices\nend_header\n".to_vec();
        for (xyz, rgb) in [([1.0f32, 2.0, 3.0], [255u8, 0, 0]), ([-1.0, 0.5, 0.25], [0, 255, 0])] {
            for v in xyz {
                data.extend_from_slice(&v.to_le_bytes());
            }
            data.extend_from_slice(&rgb);
        }

        let cloud = read_ply_from(&data[..]).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[1], Point3::new(-1.0, 0.5, 0.25));
    }

    #[test]
    fn test_binary_big_endian_doubles() {
        let mut data = b"ply\nformat binary_big_endian 1.0\nelement vertex 1\nproperty double z\nproperty double y\nproperty double x\nend_header\n".to_vec();
        for v in [3.0f64, 2.0, 1.0] {
            data.extend_from_slice(&v.to_be_bytes());
        }

        let cloud = read_ply_from(&data[..]).unwrap();
        assert_eq!(cloud.points()[0], Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_truncated_body() {
        let mut data = b"ply\nformat binary_little_endian 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nend_header\n".to_vec();
        data.extend_from_slice(&[0u8; 12]);

        let err = read_ply_from(&data[..]).unwrap_err();
        assert!(matches!(err, PlyError::BadVertex { index: 1, .. }));
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(read_ply_from(&b"obj\n"[..]), Err(PlyError::NotPly)));

        let face_first = b"ply\nformat ascii 1.0\nelement face 1\nproperty list uchar int vertex_indices\nelement vertex 1\nend_header\n";
        assert!(matches!(
            read_ply_from(&face_first[..]),
            Err(PlyError::VertexNotFirst(_))
        ));

        let no_z = b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nend_header\n0 0\n";
        assert!(matches!(
            read_ply_from(&no_z[..]),
            Err(PlyError::MissingCoordinate("z"))
        ));
    }

    #[test]
    fn test_empty_vertex_element() {
        let empty = b"ply\nformat ascii 1.0\nelement vertex 0\nproperty float x\nproperty float y\nproperty float z\nend_header\n";
        assert!(read_ply_from(&empty[..]).unwrap().is_empty());
    }
}
