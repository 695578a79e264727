// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Types and data structures for box configuration blocks.

use core::fmt;

/// Marker word opening every box configuration block.
pub const BOX_CONFIG_MAGIC: u32 = 0x42CF_B66F;

/// The only supported layout revision.
pub const BOX_CONFIG_VERSION: u32 = 100;

/// Size in bytes of an encoded configuration block, including the trailing
/// padding. The padding is part of the layout: link images are signed over
/// the whole 32-byte-aligned block, so encoding must reproduce it.
pub const BOX_CONFIG_SIZE: usize = 64;

/// Size in bytes of one packed ACL list entry.
pub const ACL_ENTRY_SIZE: usize = 12;

/// Error when parsing a configuration block or an ACL list entry.
pub enum ParseError {
    /// Not enough bytes in the buffer for the field being parsed.
    NotEnoughData,

    /// The first word of the block is not [`BOX_CONFIG_MAGIC`]. Whatever this
    /// flash region holds, it is not a box configuration.
    BadMagic(u32),

    /// The block's layout revision is one this library does not understand.
    UnsupportedVersion(u32),
}

impl From<core::array::TryFromSliceError> for ParseError {
    // We size every sub-slice ourselves before converting it, so a failed
    // conversion is a bug in this library, not bad input. Map it to the
    // length error so callers still get a sane value.
    fn from(_error: core::array::TryFromSliceError) -> Self {
        ParseError::NotEnoughData
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::NotEnoughData => write!(f, "Buffer too short for configuration block"),
            ParseError::BadMagic(found) => {
                write!(f, "Bad configuration magic: {:#010x}", found)
            }
            ParseError::UnsupportedVersion(version) => {
                write!(f, "Configuration version {} unsupported", version)
            }
        }
    }
}

/// One decoded box configuration block.
///
/// The pointer fields (`acl_list`, `fn_list`) are link-time flash addresses;
/// they are kept as raw words because this library never dereferences them.
/// Walking the lists they point to is the box loader's job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxConfig {
    /// Requested stack size for the box, in bytes.
    pub stack_size: u32,
    /// Flash address of the packed [`AclEntry`] array.
    pub acl_list: u32,
    /// Number of entries at `acl_list`.
    pub acl_count: u32,
    /// Flash address of the exported function table.
    pub fn_list: u32,
    /// Number of entries at `fn_list`.
    pub fn_count: u32,
    /// Reserved word, carried through encode/decode unchanged.
    pub reserved: u32,
}

impl BoxConfig {
    /// Encode this block into `buf`, reproducing the packed flash layout
    /// exactly: eight little-endian words followed by 32 bytes of zero
    /// padding. `buf` must hold at least [`BOX_CONFIG_SIZE`] bytes.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), ParseError> {
        let block = buf
            .get_mut(0..BOX_CONFIG_SIZE)
            .ok_or(ParseError::NotEnoughData)?;

        let words = [
            BOX_CONFIG_MAGIC,
            BOX_CONFIG_VERSION,
            self.stack_size,
            self.acl_list,
            self.acl_count,
            self.fn_list,
            self.fn_count,
            self.reserved,
        ];
        for (chunk, word) in block.chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        // Everything past the eight header words is padding.
        for byte in block[words.len() * 4..].iter_mut() {
            *byte = 0;
        }
        Ok(())
    }
}

impl TryFrom<&[u8]> for BoxConfig {
    type Error = ParseError;

    fn try_from(block: &[u8]) -> Result<BoxConfig, Self::Error> {
        // The whole block, padding included, must be present: a truncated
        // block means we ran off the end of the configuration section.
        if block.len() < BOX_CONFIG_SIZE {
            return Err(ParseError::NotEnoughData);
        }

        let word = |index: usize| -> Result<u32, ParseError> {
            let bytes: [u8; 4] = block
                .get(index * 4..index * 4 + 4)
                .ok_or(ParseError::NotEnoughData)?
                .try_into()?;
            Ok(u32::from_le_bytes(bytes))
        };

        let magic = word(0)?;
        if magic != BOX_CONFIG_MAGIC {
            return Err(ParseError::BadMagic(magic));
        }
        let version = word(1)?;
        if version != BOX_CONFIG_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        Ok(BoxConfig {
            stack_size: word(2)?,
            acl_list: word(3)?,
            acl_count: word(4)?,
            fn_list: word(5)?,
            fn_count: word(6)?,
            reserved: word(7)?,
        })
    }
}

/// One packed ACL list entry: an address interval and its access word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AclEntry {
    /// First address covered by the entry.
    pub start: u32,
    /// Length of the interval in bytes.
    pub length: u32,
    /// Opaque access-control word; interpreted by the supervisor, not here.
    pub acl: u32,
}

impl AclEntry {
    /// Encode this entry into `buf` as three little-endian words.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), ParseError> {
        let entry = buf
            .get_mut(0..ACL_ENTRY_SIZE)
            .ok_or(ParseError::NotEnoughData)?;
        entry[0..4].copy_from_slice(&self.start.to_le_bytes());
        entry[4..8].copy_from_slice(&self.length.to_le_bytes());
        entry[8..12].copy_from_slice(&self.acl.to_le_bytes());
        Ok(())
    }
}

impl TryFrom<&[u8]> for AclEntry {
    type Error = ParseError;

    fn try_from(entry: &[u8]) -> Result<AclEntry, Self::Error> {
        if entry.len() < ACL_ENTRY_SIZE {
            return Err(ParseError::NotEnoughData);
        }
        Ok(AclEntry {
            start: u32::from_le_bytes(entry[0..4].try_into()?),
            length: u32::from_le_bytes(entry[4..8].try_into()?),
            acl: u32::from_le_bytes(entry[8..12].try_into()?),
        })
    }
}
