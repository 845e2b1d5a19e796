/// Tracks how much of a newest-first collection has been requested.
///
/// Each request asks for a window `page_increment` larger than the last.
/// At most one request is outstanding; triggers fired while one is in flight
/// are dropped, not queued.
#[derive(Debug, Clone)]
pub struct PaginationCursor {
    page_increment: usize,
    requested: usize,
    more_available: bool,
    in_flight: bool,
}

impl PaginationCursor {
    pub fn new(page_increment: usize) -> Self {
        Self {
            page_increment: page_increment.max(1),
            requested: 0,
            more_available: true,
            in_flight: false,
        }
    }

    /// Window size to fetch next, or None when nothing should be fetched
    pub fn request_next(&mut self) -> Option<usize> {
        if !self.more_available {
            tracing::debug!("Pagination exhausted at {}", self.requested);
            return None;
        }
        if self.in_flight {
            tracing::debug!("Page request already in flight, dropping trigger");
            return None;
        }
        self.requested += self.page_increment;
        self.in_flight = true;
        Some(self.requested)
    }

    /// Response for the in-flight request arrived
    pub fn complete(&mut self, exhausted: bool) {
        self.in_flight = false;
        if exhausted {
            self.more_available = false;
        }
    }

    /// In-flight request failed. The window size is kept, so the next
    /// trigger still moves forward.
    pub fn fail(&mut self) {
        self.in_flight = false;
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn page_increment(&self) -> usize {
        self.page_increment
    }

    pub fn more_available(&self) -> bool {
        self.more_available
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}
