// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Box configuration block parsing code.

use crate::types::{AclEntry, BoxConfig, ParseError, ACL_ENTRY_SIZE, BOX_CONFIG_SIZE};

/// Parse one box configuration block from `flash`.
///
/// `flash` must start at a 32-byte-aligned block boundary and contain the
/// whole [`BOX_CONFIG_SIZE`]-byte block, trailing padding included.
///
/// ## Return
///
/// - `Ok(config)` when the magic and version check out.
/// - `Err(ParseError::BadMagic(_))` when this is not a configuration block;
///   callers scanning the configuration section treat this as "end of boxes".
/// - `Err(ParseError::UnsupportedVersion(_))` or
///   `Err(ParseError::NotEnoughData)` for malformed blocks.
pub fn parse_box_config(flash: &[u8]) -> Result<BoxConfig, ParseError> {
    flash.try_into()
}

/// Parse the `count` packed [`AclEntry`] records stored at `list`, invoking
/// `visit` on each in order.
///
/// Iteration stops early, returning the error, if the list is truncated.
pub fn parse_acl_list(
    list: &[u8],
    count: usize,
    mut visit: impl FnMut(AclEntry),
) -> Result<(), ParseError> {
    let mut remaining = list;
    for _ in 0..count {
        let entry: AclEntry = remaining.try_into()?;
        visit(entry);
        remaining = remaining
            .get(ACL_ENTRY_SIZE..)
            .ok_or(ParseError::NotEnoughData)?;
    }
    Ok(())
}
