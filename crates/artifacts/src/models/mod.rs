pub mod asset;
pub mod competitor;
pub mod master;
pub mod metrics;
pub mod publish;
pub mod qa;
pub mod research;
pub mod script;
pub mod trend;

/// Titles (or ids) listed in an event summary.
pub(crate) const SUMMARY_ITEMS: usize = 5;

pub(crate) fn first_n<'a, I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    items
        .into_iter()
        .take(SUMMARY_ITEMS)
        .map(str::to_string)
        .collect()
}
