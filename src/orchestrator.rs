//! The engines that drive an attack from payload to verdict.
//!
//! [`PromptSendingOrchestrator`] fans a batch of prompts out to one target
//! with bounded concurrency. [`XpiaOrchestrator`] runs the three-phase
//! cross-domain injection: plant the payload, trigger the processing model,
//! score the response.

use crate::converter::PromptConverter;
use crate::memory::AttackMemory;
use crate::score::Scorer;
use crate::storage::BlobStorageTarget;
use crate::target::PromptTarget;
use crate::{XpiaOutcome, XpiaResult};
use anyhow::Context;
use colored::*;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

/// One prompt/response exchange produced by [`PromptSendingOrchestrator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    /// The prompt as it was actually sent, after the converter chain.
    pub prompt: String,

    pub response: String,

    /// Links the exchange to its [`crate::memory::MemoryEntry`] records.
    pub conversation_id: Uuid,
}

/// Sends a batch of prompts to a single target, applying a converter chain
/// and recording every exchange into [`AttackMemory`].
pub struct PromptSendingOrchestrator {
    target: Arc<dyn PromptTarget>,
    converters: Vec<Arc<dyn PromptConverter>>,
    concurrency: usize,
    memory: Arc<AttackMemory>,
}

impl PromptSendingOrchestrator {
    pub fn new(target: Arc<dyn PromptTarget>, concurrency: usize) -> Self {
        Self {
            target,
            converters: Vec::new(),
            concurrency: concurrency.max(1),
            memory: Arc::new(AttackMemory::new()),
        }
    }

    pub fn with_converters(mut self, converters: Vec<Arc<dyn PromptConverter>>) -> Self {
        self.converters = converters;
        self
    }

    pub fn memory(&self) -> Arc<AttackMemory> {
        Arc::clone(&self.memory)
    }

    fn apply_converters(&self, prompt: &str) -> XpiaResult<String> {
        let mut converted = prompt.to_string();
        for converter in &self.converters {
            converted = converter
                .convert(&converted)
                .with_context(|| format!("Converter '{}' failed", converter.name()))?;
        }
        Ok(converted)
    }

    /// Sends every prompt in the batch. Individual request failures are
    /// reported and skipped; they never abort the batch.
    pub async fn send_prompts(&self, prompts: Vec<String>) -> XpiaResult<Vec<PromptResponse>> {
        println!(
            "Sending {} prompts with concurrency: {}",
            prompts.len(),
            self.concurrency
        );

        let converted: Vec<String> = prompts
            .iter()
            .filter_map(|prompt| match self.apply_converters(prompt) {
                Ok(converted) => Some(converted),
                Err(e) => {
                    eprintln!("Skipping prompt: {}", e);
                    None
                }
            })
            .collect();

        let results = stream::iter(converted)
            .map(|prompt| {
                let target = Arc::clone(&self.target);
                let memory = Arc::clone(&self.memory);

                async move {
                    let conversation_id = Uuid::new_v4();
                    let labels = HashMap::from([(
                        "orchestrator".to_string(),
                        "prompt_sending".to_string(),
                    )]);

                    memory.record(conversation_id, "user", &prompt, labels.clone());

                    let response = match target.send_prompt(&prompt).await {
                        Ok(r) => r,
                        Err(e) => {
                            eprintln!("Request failed: {}", e);
                            return None;
                        }
                    };

                    memory.record(conversation_id, "assistant", &response, labels);

                    print!(".");
                    io::stdout().flush().ok();

                    Some(PromptResponse {
                        prompt,
                        response,
                        conversation_id,
                    })
                }
            })
            .buffer_unordered(self.concurrency) // Run N futures in parallel
            .filter_map(|x| async { x }) // Filter out failed requests
            .collect::<Vec<_>>()
            .await;

        println!("\n{}", "Batch complete.".bold().white());
        Ok(results)
    }
}

/// Drives a cross-domain prompt injection attack end to end.
///
/// Phase 1 plants `attack_content` in the attack-setup container. Phase 2
/// sends `processing_prompt` to the processing model; the model (or its
/// document plugin) is what touches the poisoned content. Phase 3 hands the
/// response to the scorer.
pub struct XpiaOrchestrator {
    attack_content: String,
    processing_prompt: String,
    attack_setup_target: Arc<BlobStorageTarget>,
    processing_target: Arc<dyn PromptTarget>,
    scorer: Arc<dyn Scorer>,
    inline_uploaded_content: bool,
    verbose: bool,
    memory: Arc<AttackMemory>,
}

impl XpiaOrchestrator {
    pub fn new(
        attack_content: String,
        processing_prompt: String,
        attack_setup_target: Arc<BlobStorageTarget>,
        processing_target: Arc<dyn PromptTarget>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            attack_content,
            processing_prompt,
            attack_setup_target,
            processing_target,
            scorer,
            inline_uploaded_content: false,
            verbose: false,
            memory: Arc::new(AttackMemory::new()),
        }
    }

    /// When set, the container's blobs are downloaded and appended to the
    /// processing prompt before it is sent, as a local stand-in for the
    /// target-side plugin that reads the poisoned store.
    pub fn with_inline_uploaded_content(mut self, inline: bool) -> Self {
        self.inline_uploaded_content = inline;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn memory(&self) -> Arc<AttackMemory> {
        Arc::clone(&self.memory)
    }

    pub async fn execute(&self) -> XpiaResult<XpiaOutcome> {
        let conversation_id = Uuid::new_v4();
        let labels =
            HashMap::from([("orchestrator".to_string(), "xpia".to_string())]);

        // Phase 1: plant the payload. A failed upload aborts the run before
        // any processing call is made.
        if self.verbose {
            println!("{}", "Planting payload in attack-setup target...".cyan());
        }
        let blob_url = self
            .attack_setup_target
            .send_prompt(&self.attack_content)
            .await
            .context("Attack setup failed; aborting before processing")?;

        let mut setup_labels = labels.clone();
        setup_labels.insert("blob_url".to_string(), blob_url.clone());
        self.memory
            .record(conversation_id, "attack_setup", &self.attack_content, setup_labels);

        if self.verbose {
            println!("Payload planted at {}", blob_url);
        }

        // Phase 2: trigger the processing model.
        let mut processing_prompt = self.processing_prompt.clone();
        if self.inline_uploaded_content {
            for name in self.attack_setup_target.list_blobs().await? {
                let body = self.attack_setup_target.download_blob(&name).await?;
                processing_prompt.push_str("\n\n--- document ---\n");
                processing_prompt.push_str(&body);
            }
        }

        self.memory
            .record(conversation_id, "user", &processing_prompt, labels.clone());

        let response = self
            .processing_target
            .send_prompt(&processing_prompt)
            .await
            .context("Processing target failed")?;

        self.memory
            .record(conversation_id, "assistant", &response, labels);

        // Phase 3: score.
        let score = self.scorer.score_text(&response).await?;

        if self.verbose {
            if score.value {
                println!("[{}] {}", "VULNERABLE".red().bold(), score.rationale);
            } else {
                println!("[{}] {}", "SAFE".green().bold(), score.rationale);
            }
        }

        Ok(XpiaOutcome {
            attack_content: self.attack_content.clone(),
            processing_prompt,
            processing_response: response,
            score,
        })
    }

    /// Removes every blob from the attack-setup container and returns how
    /// many were deleted. Callers run this after `execute`, success or
    /// failure, so the poisoned content never outlives the experiment.
    pub async fn teardown(&self) -> XpiaResult<usize> {
        self.attack_setup_target.delete_all_blobs().await
    }
}
