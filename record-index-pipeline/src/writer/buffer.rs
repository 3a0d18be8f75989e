use std::collections::BTreeMap;

use record_index_shared::Document;

/// Documents held back while a bulk session is open, grouped by index type.
#[derive(Debug, Default)]
pub(crate) struct BulkBuffer {
    buffering: bool,
    pending: BTreeMap<String, Vec<Document>>,
}

impl BulkBuffer {
    pub fn start(&mut self) {
        self.buffering = true;
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Keep the document if a session is open, otherwise hand it back.
    pub fn offer(&mut self, document: Document) -> Option<Document> {
        if !self.buffering {
            return Some(document);
        }
        self.pending
            .entry(document.index_type.clone())
            .or_default()
            .push(document);
        None
    }

    /// Close the session and take everything it collected.
    pub fn finish(&mut self) -> BTreeMap<String, Vec<Document>> {
        self.buffering = false;
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}
