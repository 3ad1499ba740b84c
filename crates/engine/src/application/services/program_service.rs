//! Firmware image uploads.
//!
//! Content is stored under `programs/<id>` with a SHA-256 digest computed
//! while writing; the record follows the bytes, with an unlink compensating
//! a failed commit.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use simbench_domain::{CoreError, Program, ProgramFormat, ProgramId};

use crate::application::ports::outbound::ProgramRepo;

pub struct ProgramService {
    repo: Arc<dyn ProgramRepo>,
    data_dir: PathBuf,
}

impl ProgramService {
    pub fn new(repo: Arc<dyn ProgramRepo>, data_dir: PathBuf) -> Self {
        Self { repo, data_dir }
    }

    pub async fn upload(
        &self,
        name: String,
        format_hint: Option<String>,
        bytes: &[u8],
    ) -> Result<Program, CoreError> {
        let format = match format_hint {
            Some(tag) => tag.parse::<ProgramFormat>()?,
            None => ProgramFormat::from_file_name(&name),
        };

        let dir = self.data_dir.join("programs");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::internal(format!("program dir: {e}")))?;
        let id = ProgramId::new();
        let path = dir.join(id.to_string());

        let mut hasher = Sha256::new();
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| CoreError::internal(format!("program write: {e}")))?;
        for chunk in bytes.chunks(64 * 1024) {
            hasher.update(chunk);
            file.write_all(chunk)
                .await
                .map_err(|e| CoreError::internal(format!("program write: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| CoreError::internal(format!("program write: {e}")))?;
        drop(file);

        let program = Program {
            id,
            name,
            format,
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(hasher.finalize()),
            path: path.display().to_string(),
            created_at: Utc::now(),
        };

        if let Err(persist_err) = self.repo.insert(&program).await {
            if let Err(fs_err) = tokio::fs::remove_file(&path).await {
                tracing::debug!(path = %path.display(), error = %fs_err, "program unlink failed");
            }
            return Err(persist_err);
        }
        tracing::info!(
            program_id = %program.id,
            size_bytes = program.size_bytes,
            sha256 = %program.sha256,
            "program stored"
        );
        Ok(program)
    }

    pub async fn get(&self, id: ProgramId) -> Result<Program, CoreError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("program", id))
    }

    pub async fn list(&self) -> Result<Vec<Program>, CoreError> {
        self.repo.list().await
    }

    pub async fn delete(&self, id: ProgramId) -> Result<(), CoreError> {
        let program = self.get(id).await?;
        if let Err(e) = tokio::fs::remove_file(&program.path).await {
            tracing::debug!(program_id = %id, error = %e, "program blob already gone");
        }
        self.repo.delete(id).await
    }
}
