// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

use std::sync::Arc;

use crate::config::Settings;
use crate::probe::DataProbe;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Data store probe; when absent the health body omits the database fields.
    pub probe: Option<Arc<dyn DataProbe>>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn DataProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}
