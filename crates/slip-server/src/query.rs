//! `_HLS_*` delivery directive parsing.

use slip_core::Error;
use std::collections::HashMap;

/// Parsed LL-HLS delivery directives from a playlist request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HlsQuery {
    /// `(_HLS_msn, _HLS_part)`; the part index defaults to 0 when only
    /// `_HLS_msn` is given. `None` means a plain (non-blocking) request.
    pub msn_and_part: Option<(u64, u64)>,
    /// True iff `_HLS_skip` requested a playlist delta update.
    pub is_delta_update: bool,
}

impl HlsQuery {
    /// Parse the request query parameters.
    ///
    /// Malformed integers and `_HLS_part` without `_HLS_msn` are client
    /// errors.
    pub fn parse(params: &HashMap<String, String>) -> slip_core::Result<Self> {
        let is_delta_update = matches!(
            params.get("_HLS_skip").map(String::as_str),
            Some("YES") | Some("v2")
        );

        let msn = params
            .get("_HLS_msn")
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| Error::Validation(format!("invalid _HLS_msn: {v}")))
            })
            .transpose()?;

        let part = params
            .get("_HLS_part")
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| Error::Validation(format!("invalid _HLS_part: {v}")))
            })
            .transpose()?;

        let msn_and_part = match (msn, part) {
            (Some(msn), part) => Some((msn, part.unwrap_or(0))),
            (None, Some(_)) => {
                return Err(Error::Validation(
                    "_HLS_part requires _HLS_msn".into(),
                ))
            }
            (None, None) => None,
        };

        Ok(Self {
            msn_and_part,
            is_delta_update,
        })
    }

    /// A plain full-playlist request; used by non-HTTP callers.
    pub fn plain() -> Self {
        Self {
            msn_and_part: None,
            is_delta_update: false,
        }
    }
}
