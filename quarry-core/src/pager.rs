use crate::{ErrorKind, Operation, Payload, Result, Schema, error};

/// Page arithmetic over a paged result set.
///
/// Owns the count payload of the result set it comes from, so resolving
/// the total never needs the result set itself and can run concurrently
/// with fetching the page. Everything but [`Pager::total_entries`] is pure
/// arithmetic over the resolved total.
#[derive(Debug, Clone)]
pub struct Pager {
    schema: Schema,
    count_payload: Payload,
    entries_per_page: u64,
    current_page: u64,
    total: Option<u64>,
}

impl Pager {
    pub(crate) fn new(
        schema: Schema,
        count_payload: Payload,
        entries_per_page: u64,
        current_page: u64,
    ) -> Self {
        Self {
            schema,
            count_payload,
            entries_per_page,
            current_page: current_page.max(1),
            total: None,
        }
    }

    pub fn entries_per_page(&self) -> u64 {
        self.entries_per_page
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Size of the whole match set, dispatched once and memoized.
    pub async fn total_entries(&mut self) -> Result<u64> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        let total = self
            .schema
            .dispatcher()
            .dispatch(Operation::Count, self.count_payload.clone())
            .await?
            .count();
        self.total = Some(total);
        Ok(total)
    }

    /// Total already resolved, if any.
    pub fn resolved_total(&self) -> Option<u64> {
        self.total
    }

    fn total(&self) -> Result<u64> {
        self.total.ok_or_else(|| {
            error(
                ErrorKind::Validation,
                "The total number of entries must be resolved before page arithmetic",
            )
        })
    }

    pub fn first_page(&self) -> u64 {
        1
    }

    /// At least 1, an empty match set still has one (empty) page.
    pub fn last_page(&self) -> Result<u64> {
        let total = self.total()?;
        Ok(total.div_ceil(self.entries_per_page.max(1)).max(1))
    }

    /// 1 based index of the first entry of the current page, 0 when it is empty.
    pub fn first_entry(&self) -> Result<u64> {
        Ok(match self.entries_on_this_page()? {
            0 => 0,
            _ => self.skipped().saturating_add(1),
        })
    }

    pub fn last_entry(&self) -> Result<u64> {
        Ok(match self.entries_on_this_page()? {
            0 => 0,
            n => self.skipped().saturating_add(n),
        })
    }

    pub fn entries_on_this_page(&self) -> Result<u64> {
        let total = self.total()?;
        Ok(total.saturating_sub(self.skipped()).min(self.entries_per_page))
    }

    fn skipped(&self) -> u64 {
        (self.current_page - 1).saturating_mul(self.entries_per_page)
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.current_page > 1).then(|| self.current_page - 1)
    }

    pub fn next_page(&self) -> Result<Option<u64>> {
        Ok((self.current_page < self.last_page()?).then(|| self.current_page + 1))
    }
}
