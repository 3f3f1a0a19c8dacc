//! Object file encodings for compiled programs

use crate::codegen::{CodegenError, Instruction, OpCode, Program};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// "PL0\0" in ASCII
const MAGIC: u32 = 0x504C_3000;
const VERSION_MAJOR: u8 = 1;
const VERSION_MINOR: u8 = 0;
const VERSION_PATCH: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ObjectFormat {
    /// One `opcode level modifier` line per instruction
    #[default]
    Text,
    /// Big-endian binary with a magic header
    Binary,
    /// Pretty printed JSON
    Json,
}

impl ObjectFormat {
    /// Guess the format from a file extension, falling back to text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ObjectFormat::Json,
            Some("bin") => ObjectFormat::Binary,
            _ => ObjectFormat::Text,
        }
    }
}

/// Encodes a program in the given format
pub fn write_program<W: Write>(
    program: &Program,
    format: ObjectFormat,
    writer: &mut W,
) -> Result<(), ObjectError> {
    match format {
        ObjectFormat::Text => {
            for instruction in program.iter() {
                writeln!(
                    writer,
                    "{} {} {}",
                    u8::from(instruction.opcode),
                    instruction.level,
                    instruction.modifier
                )?;
            }
        }
        ObjectFormat::Binary => {
            writer.write_u32::<BigEndian>(MAGIC)?;
            writer.write_u8(VERSION_MAJOR)?;
            writer.write_u8(VERSION_MINOR)?;
            writer.write_u16::<BigEndian>(VERSION_PATCH)?;

            let count = u32::try_from(program.len())
                .map_err(|_| ObjectError::InvalidFormat("too many instructions".to_string()))?;
            writer.write_u32::<BigEndian>(count)?;
            for instruction in program.iter() {
                writer.write_u8(instruction.opcode.into())?;
                writer.write_u16::<BigEndian>(instruction.level)?;
                writer.write_i32::<BigEndian>(instruction.modifier)?;
            }
        }
        ObjectFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, program)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Decodes a program previously written with `write_program`
pub fn read_program<R: Read>(reader: &mut R, format: ObjectFormat) -> Result<Program, ObjectError> {
    match format {
        ObjectFormat::Text => read_text(reader),
        ObjectFormat::Binary => read_binary(reader),
        ObjectFormat::Json => Ok(serde_json::from_reader(reader)?),
    }
}

/// Writes a program to a file, replacing anything already there
pub fn write_object_file<P: AsRef<Path>>(
    program: &Program,
    format: ObjectFormat,
    path: P,
) -> Result<(), ObjectError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_program(program, format, &mut writer)
}

pub fn read_object_file<P: AsRef<Path>>(path: P, format: ObjectFormat) -> Result<Program, ObjectError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_program(&mut reader, format)
}

fn read_text<R: Read>(reader: &mut R) -> Result<Program, ObjectError> {
    let mut instructions = Vec::new();

    for (number, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let malformed = || ObjectError::MalformedLine(number + 1, line.clone());
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(malformed());
        }

        let opcode = fields[0].parse::<u8>().map_err(|_| malformed())?;
        let level = fields[1].parse::<u16>().map_err(|_| malformed())?;
        let modifier = fields[2].parse::<i32>().map_err(|_| malformed())?;
        instructions.push(Instruction::new(OpCode::try_from(opcode)?, level, modifier));
    }

    Ok(Program::new(instructions))
}

fn read_binary<R: Read>(reader: &mut R) -> Result<Program, ObjectError> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != MAGIC {
        return Err(ObjectError::InvalidFormat("Invalid magic number".to_string()));
    }

    let major = reader.read_u8()?;
    if major != VERSION_MAJOR {
        return Err(ObjectError::UnsupportedVersion(major));
    }
    let _minor = reader.read_u8()?;
    let _patch = reader.read_u16::<BigEndian>()?;

    let count = reader.read_u32::<BigEndian>()? as usize;
    let mut instructions = Vec::new();
    for _ in 0..count {
        let opcode = OpCode::try_from(reader.read_u8()?)?;
        let level = reader.read_u16::<BigEndian>()?;
        let modifier = reader.read_i32::<BigEndian>()?;
        instructions.push(Instruction::new(opcode, level, modifier));
    }

    Ok(Program::new(instructions))
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid object file: {0}")]
    InvalidFormat(String),

    #[error("Unsupported object file version: {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed instruction on line {0}: '{1}'")]
    MalformedLine(usize, String),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}
