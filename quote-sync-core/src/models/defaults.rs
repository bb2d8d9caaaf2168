use super::{Record, RecordSource};

/// Built-in quotes used when nothing usable is persisted.
const DEFAULT_QUOTES: [(&str, &str); 8] = [
    (
        "The only way to do great work is to love what you do.",
        "Motivation",
    ),
    (
        "Innovation distinguishes between a leader and a follower.",
        "Leadership",
    ),
    (
        "Life is what happens to you while you're busy making other plans.",
        "Life",
    ),
    (
        "The future belongs to those who believe in the beauty of their dreams.",
        "Dreams",
    ),
    (
        "It is during our darkest moments that we must focus to see the light.",
        "Hope",
    ),
    (
        "Success is not final, failure is not fatal: it is the courage to continue that counts.",
        "Success",
    ),
    (
        "The way to get started is to quit talking and begin doing.",
        "Action",
    ),
    (
        "Don't be afraid to give up the good to go for the great.",
        "Growth",
    ),
];

/// The default replica. Ids are stable so repeated loads agree.
pub fn default_records() -> Vec<Record> {
    DEFAULT_QUOTES
        .iter()
        .enumerate()
        .map(|(i, (text, category))| {
            Record::new(format!("default_{}", i + 1), *text, *category)
                .with_source(RecordSource::Local)
        })
        .collect()
}
