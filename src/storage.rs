//! Azure-blob-style container client used as the XPIA attack-setup target.
//!
//! Authentication is a container URL plus a shared-access-signature token,
//! appended to every request as query parameters. Only the four operations the
//! attack lifecycle needs are implemented: upload, list, download, delete.

use crate::target::PromptTarget;
use crate::XpiaResult;
use anyhow::{bail, Context};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::env;
use uuid::Uuid;

pub struct BlobStorageTarget {
    client: Client,
    container_url: String,
    sas_token: String,
}

impl BlobStorageTarget {
    pub fn new(container_url: &str, sas_token: &str) -> Self {
        Self {
            client: Client::new(),
            container_url: container_url.trim_end_matches('/').to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
        }
    }

    /// Reads the `AZURE_STORAGE_URL` and `AZURE_STORAGE_SAS_TOKEN` environment
    /// variables.
    pub fn from_env() -> XpiaResult<Self> {
        let container_url =
            env::var("AZURE_STORAGE_URL").context("AZURE_STORAGE_URL must be set")?;
        let sas_token =
            env::var("AZURE_STORAGE_SAS_TOKEN").context("AZURE_STORAGE_SAS_TOKEN must be set")?;
        Ok(Self::new(&container_url, &sas_token))
    }

    /// The blob's public URL, without the SAS token.
    pub fn blob_url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url, name)
    }

    fn signed_blob_url(&self, name: &str) -> String {
        format!("{}/{}?{}", self.container_url, name, self.sas_token)
    }

    fn signed_list_url(&self) -> String {
        format!(
            "{}?restype=container&comp=list&{}",
            self.container_url, self.sas_token
        )
    }

    pub async fn upload_blob(&self, name: &str, content: &str) -> XpiaResult<()> {
        let response = self
            .client
            .put(self.signed_blob_url(name))
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(content.to_string())
            .send()
            .await
            .with_context(|| format!("Upload request for blob '{}' failed", name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Upload of blob '{}' rejected: {} {}", name, status, body);
        }
        Ok(())
    }

    /// Lists the names of every blob currently in the container.
    pub async fn list_blobs(&self) -> XpiaResult<Vec<String>> {
        let response = self
            .client
            .get(self.signed_list_url())
            .send()
            .await
            .context("Container listing request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("Container listing rejected: {} {}", status, body);
        }

        // The listing is an EnumerationResults XML document; only the blob
        // names matter here.
        let name_tag = Regex::new(r"<Name>([^<]+)</Name>")?;
        Ok(name_tag
            .captures_iter(&body)
            .map(|c| c[1].to_string())
            .collect())
    }

    pub async fn download_blob(&self, name: &str) -> XpiaResult<String> {
        let response = self
            .client
            .get(self.signed_blob_url(name))
            .send()
            .await
            .with_context(|| format!("Download request for blob '{}' failed", name))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("Download of blob '{}' rejected: {} {}", name, status, body);
        }
        Ok(body)
    }

    pub async fn delete_blob(&self, name: &str) -> XpiaResult<()> {
        let response = self
            .client
            .delete(self.signed_blob_url(name))
            .send()
            .await
            .with_context(|| format!("Delete request for blob '{}' failed", name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Delete of blob '{}' rejected: {} {}", name, status, body);
        }
        Ok(())
    }

    /// Deletes every blob the listing reports and returns how many were
    /// removed. Safe to call on an empty container.
    pub async fn delete_all_blobs(&self) -> XpiaResult<usize> {
        let names = self.list_blobs().await?;
        for name in &names {
            self.delete_blob(name).await?;
        }
        Ok(names.len())
    }
}

#[async_trait]
impl PromptTarget for BlobStorageTarget {
    /// The storage target "answers" a prompt by uploading it under a fresh
    /// blob name and returning the blob URL the processing side will see.
    async fn send_prompt(&self, prompt: &str) -> XpiaResult<String> {
        let name = format!("xpia-{}.txt", Uuid::new_v4());
        self.upload_blob(&name, prompt).await?;
        Ok(self.blob_url(&name))
    }
}
