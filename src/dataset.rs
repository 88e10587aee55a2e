//! Loaders for the legacy ANN benchmark dataset formats.
//!
//! Each file is a flat concatenation of records, one per vector:
//! a 4-byte little-endian `i32` dimension followed by the components
//! (`f32` for `.fvecs`, `u8` for `.bvecs`, `i32` for `.ivecs`). All vectors
//! in a file share the same dimension; the vector count is inferred from
//! the file size.
//!
//! Byte vectors are promoted to `f32` and integer vectors widened to `i64`
//! in memory, so base/query sets always load as `f32` and ground-truth sets
//! as `i64`.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

fn open_records(path: &Path, component_size: usize) -> Result<(BufReader<File>, usize, usize)> {
    let file = File::open(path).map_err(Error::io_err(path, "failed to open dataset file"))?;
    let total_len = file
        .metadata()
        .map_err(Error::io_err(path, "failed to stat dataset file"))?
        .len() as usize;

    let mut reader = BufReader::new(file);
    let dim = reader
        .read_i32::<LittleEndian>()
        .map_err(Error::io_err(path, "failed to read leading dimension"))?;
    if dim <= 0 {
        return Err(Error::dataset(
            path,
            format!("non-positive dimension {}", dim),
        ));
    }
    let dim = dim as usize;

    let record_size = 4 + dim * component_size;
    if total_len % record_size != 0 {
        return Err(Error::dataset(
            path,
            format!(
                "file size {} is not a multiple of the record size {}",
                total_len, record_size
            ),
        ));
    }
    let n = total_len / record_size;

    Ok((reader, dim, n))
}

fn read_record_dim(reader: &mut BufReader<File>, path: &Path, expected: usize) -> Result<()> {
    let dim = reader
        .read_i32::<LittleEndian>()
        .map_err(Error::io_err(path, "failed to read record dimension"))?;
    if dim as usize != expected {
        return Err(Error::dataset(
            path,
            format!("inconsistent dimension: expected {}, found {}", expected, dim),
        ));
    }
    Ok(())
}

/// Load an `.fvecs` file. Returns `(n, dim, row-major data)`.
pub fn read_fvecs(path: impl AsRef<Path>) -> Result<(usize, usize, Vec<f32>)> {
    let path = path.as_ref();
    let (mut reader, dim, n) = open_records(path, 4)?;

    let mut data = vec![0f32; n * dim];
    for (i, row) in data.chunks_mut(dim).enumerate() {
        if i > 0 {
            read_record_dim(&mut reader, path, dim)?;
        }
        reader
            .read_f32_into::<LittleEndian>(row)
            .map_err(Error::io_err(path, "failed to read vector components"))?;
    }
    Ok((n, dim, data))
}

/// Load a `.bvecs` file, promoting the byte components to `f32`.
/// Returns `(n, dim, row-major data)`.
pub fn read_bvecs(path: impl AsRef<Path>) -> Result<(usize, usize, Vec<f32>)> {
    let path = path.as_ref();
    let (mut reader, dim, n) = open_records(path, 1)?;

    let mut data = Vec::with_capacity(n * dim);
    let mut row = vec![0u8; dim];
    for i in 0..n {
        if i > 0 {
            read_record_dim(&mut reader, path, dim)?;
        }
        reader
            .read_exact(&mut row)
            .map_err(Error::io_err(path, "failed to read vector components"))?;
        data.extend(row.iter().map(|&b| f32::from(b)));
    }
    Ok((n, dim, data))
}

/// Load an `.ivecs` file, widening the components to `i64`.
/// Returns `(n, dim, row-major data)`.
pub fn read_ivecs(path: impl AsRef<Path>) -> Result<(usize, usize, Vec<i64>)> {
    let path = path.as_ref();
    let (mut reader, dim, n) = open_records(path, 4)?;

    let mut data = Vec::with_capacity(n * dim);
    let mut row = vec![0i32; dim];
    for i in 0..n {
        if i > 0 {
            read_record_dim(&mut reader, path, dim)?;
        }
        reader
            .read_i32_into::<LittleEndian>(&mut row)
            .map_err(Error::io_err(path, "failed to read vector components"))?;
        data.extend(row.iter().map(|&v| i64::from(v)));
    }
    Ok((n, dim, data))
}

/// Load a float dataset, dispatching on the file extension
/// (`.fvecs` or `.bvecs`).
pub fn read_vectors(path: impl AsRef<Path>) -> Result<(usize, usize, Vec<f32>)> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("fvecs") => read_fvecs(path),
        Some("bvecs") => read_bvecs(path),
        other => Err(Error::dataset(
            path,
            format!("unsupported extension {:?}", other),
        )),
    }
}
