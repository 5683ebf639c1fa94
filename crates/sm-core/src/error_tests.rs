// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn http_status_maps_not_found_to_404() {
    assert_eq!(ErrorCode::NotFound.http_status(), 404);
}

#[test]
fn registry_error_codes_match_kind() {
    let err = RegistryError::NotFound("abcd1234".into());
    assert_eq!(err.code(), ErrorCode::NotFound);
}
