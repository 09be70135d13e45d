// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::Error;
use crate::event::Event;
use crate::localdb::Events;
use crate::types::{EventId, Scope};

/// Events already loaded during one request, keyed by id.
///
/// Lives for a single call; writes made during the call must [`forget`](Self::forget)
/// the rows they touch.
#[derive(Debug, Default)]
pub(crate) struct RequestMemo {
    events: HashMap<EventId, Event>,
}

impl RequestMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &mut self,
        events: &Events,
        scope: &Scope,
        id: EventId,
    ) -> Result<Option<Event>, Error> {
        if let Some(event) = self.events.get(&id) {
            return Ok(Some(event.clone()));
        }

        let found = events.get(scope, id).await?;
        if let Some(event) = &found {
            self.events.insert(id, event.clone());
        }
        Ok(found)
    }

    pub fn remember(&mut self, event: &Event) {
        if let Some(id) = event.id {
            self.events.insert(id, event.clone());
        }
    }

    pub fn forget(&mut self, id: EventId) {
        self.events.remove(&id);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
