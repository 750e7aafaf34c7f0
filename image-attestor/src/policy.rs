// Copyright (c) 2024 The image-attestor Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Skip list and subject allow list.

use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::{Error, Result};

#[derive(Debug, Default)]
struct PolicyState {
    skipped_images: HashSet<String>,
    allowed_subjects: HashSet<String>,
    allow_list_enabled: bool,
}

/// Attestation policy shared by every attestation of one engine.
///
/// Each check and mutation takes the lock for its own duration only, so a
/// reader sees either the state before or after a mutation, never a mix.
#[derive(Debug, Default)]
pub struct PolicySets {
    state: RwLock<PolicyState>,
}

impl PolicySets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether signature verification is bypassed for `image_id`.
    pub async fn should_skip(&self, image_id: &str) -> Result<bool> {
        let state = self.state.read().await;
        if state.skipped_images.is_empty() {
            return Ok(false);
        }
        if image_id.is_empty() {
            return Err(Error::EmptyImageId);
        }
        Ok(state.skipped_images.contains(image_id))
    }

    /// Whether selectors for `subject` may be surfaced.
    pub async fn is_allowed(&self, subject: &str) -> bool {
        let state = self.state.read().await;
        !state.allow_list_enabled || state.allowed_subjects.contains(subject)
    }

    /// Filter with a single consistent view of the allow list.
    pub async fn retain_allowed<T, F>(&self, items: Vec<T>, subject: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        let state = self.state.read().await;
        if !state.allow_list_enabled {
            return items;
        }
        items
            .into_iter()
            .filter(|item| state.allowed_subjects.contains(subject(item)))
            .collect()
    }

    pub async fn add_skipped_image(&self, image_id: impl Into<String>) {
        self.state.write().await.skipped_images.insert(image_id.into());
    }

    pub async fn clear_skip_list(&self) {
        self.state.write().await.skipped_images.clear();
    }

    pub async fn add_allowed_subject(&self, subject: impl Into<String>) {
        self.state
            .write()
            .await
            .allowed_subjects
            .insert(subject.into());
    }

    pub async fn clear_allowed_subjects(&self) {
        self.state.write().await.allowed_subjects.clear();
    }

    pub async fn enable_allowed_subjects_list(&self, enabled: bool) {
        self.state.write().await.allow_list_enabled = enabled;
    }
}
