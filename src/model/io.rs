//! Binary weight files: `[i64 rows][i64 cols][rows * cols f32]`, little-endian,
//! row-major.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;

use crate::error::{Error, Result};

const HEADER_BYTES: u64 = 16;

pub(crate) fn write_weights(path: &Path, weights: &Array2<f32>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_i64::<LittleEndian>(weights.nrows() as i64)?;
    writer.write_i64::<LittleEndian>(weights.ncols() as i64)?;
    // logical order of `iter` is row-major whatever the memory layout
    for &w in weights.iter() {
        writer.write_f32::<LittleEndian>(w)?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn read_weights(path: &Path) -> Result<Array2<f32>> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let rows = reader.read_i64::<LittleEndian>()?;
    let cols = reader.read_i64::<LittleEndian>()?;
    if rows < 0 || cols < 0 {
        return Err(Error::Data(format!(
            "negative weight dimensions {}x{} in {}",
            rows,
            cols,
            path.display()
        )));
    }
    let (rows, cols) = (rows as usize, cols as usize);
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| Error::Data(format!("weight dimensions {}x{} overflow", rows, cols)))?;

    // refuse to allocate for a header that promises more than the file holds
    if (len as u64).saturating_mul(4).saturating_add(HEADER_BYTES) > file_len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("weights file {} is truncated", path.display()),
        )
        .into());
    }

    let mut values = vec![0.0f32; len];
    reader.read_f32_into::<LittleEndian>(&mut values)?;
    Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Data(e.to_string()))
}
