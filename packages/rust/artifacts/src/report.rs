//! Machine-readable diagnostics report (`diagnostics.json`).

use std::path::Path;

use chrono::{DateTime, Utc};
use feedgen_shared::{Diagnostics, Result, RunId};
use serde::Serialize;

use crate::writer::{ArtifactMeta, write_json};

#[derive(Debug, Serialize)]
struct DiagnosticsDocument<'a> {
    run_id: &'a RunId,
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    diagnostics: &'a Diagnostics,
}

pub fn emit_diagnostics(
    path: &Path,
    run_id: &RunId,
    generated_at: DateTime<Utc>,
    diagnostics: &Diagnostics,
) -> Result<ArtifactMeta> {
    write_json(
        path,
        &DiagnosticsDocument {
            run_id,
            generated_at,
            diagnostics,
        },
    )
}
