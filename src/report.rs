use log::info;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::extract::{ExtractedRecord, PayloadStrategy};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub total_records: usize,
    pub with_questions: usize,
    pub type_counts: BTreeMap<String, usize>,
    pub subtype_counts: BTreeMap<String, usize>,
    pub strategy_counts: BTreeMap<PayloadStrategy, usize>,
    pub skipped_records: usize,
    pub filtered_records: usize,
}

impl SummaryStats {
    pub fn collect(records: &[ExtractedRecord], strategies: &[PayloadStrategy]) -> Self {
        let mut stats = SummaryStats {
            total_records: records.len(),
            ..Default::default()
        };

        for record in records {
            if !record.question.trim().is_empty() {
                stats.with_questions += 1;
            }
            *stats.type_counts.entry(record.kind.clone()).or_insert(0) += 1;
            *stats.subtype_counts.entry(record.subtype.clone()).or_insert(0) += 1;
        }
        for strategy in strategies {
            *stats.strategy_counts.entry(*strategy).or_insert(0) += 1;
        }
        stats
    }

    /// Count per strategy, in declaration order, including unused ones.
    pub fn strategy_breakdown(&self) -> Vec<(PayloadStrategy, usize)> {
        PayloadStrategy::ALL
            .iter()
            .map(|strategy| (*strategy, self.strategy_counts.get(strategy).copied().unwrap_or(0)))
            .collect()
    }
}

/// The records a preview of `limit` entries shows.
pub fn preview_slice(records: &[ExtractedRecord], limit: usize) -> &[ExtractedRecord] {
    &records[..limit.min(records.len())]
}

/// Cuts `text` to at most `width` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, width: usize) -> String {
    match text.char_indices().nth(width) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

pub fn log_preview(records: &[ExtractedRecord], limit: usize, answer_width: usize) {
    if limit == 0 {
        return;
    }
    if records.is_empty() {
        info!("No records to preview");
        return;
    }

    let shown = preview_slice(records, limit);
    info!("Extracted records (showing first {}):", shown.len());
    info!("{}", "-".repeat(100));
    for (i, record) in shown.iter().enumerate() {
        info!("Record {}:", i + 1);
        info!("  ID: {}", record.id);
        info!("  Question: {}", record.question);
        info!("  Answer: {}", truncate_chars(&record.answer, answer_width));
        info!("  Date: {}", record.created_at);
        info!("  IP: {}", record.ip);
        info!("  Type: {}", record.kind);
        info!("  Subtype: {}", record.subtype);
        info!("{}", "-".repeat(100));
    }
}

pub fn log_summary(stats: &SummaryStats, elapsed: Duration) {
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(elapsed));
    info!("Total records: {}", stats.total_records);
    info!("Records with a question: {}", stats.with_questions);
    info!("Raw records skipped: {}", stats.skipped_records);
    info!("Records removed by type filter: {}", stats.filtered_records);

    info!("arg1 recovery:");
    for (strategy, count) in stats.strategy_breakdown() {
        info!("  - {}: {}", strategy, count);
    }

    info!("Type distribution:");
    for (kind, count) in &stats.type_counts {
        info!("  {}: {}", kind, count);
    }

    info!("Subtype distribution:");
    for (subtype, count) in &stats.subtype_counts {
        info!("  {}: {}", subtype, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(question: &str, kind: &str, subtype: &str) -> ExtractedRecord {
        ExtractedRecord {
            question: question.to_string(),
            kind: kind.to_string(),
            subtype: subtype.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_collect_counts_and_distributions() {
        let records = vec![
            record("Where is my parcel?", "shipping", "delay"),
            record("   ", "shipping", ""),
            record("", "", ""),
            record("Refund?", "billing", "refund"),
        ];
        let strategies = vec![
            PayloadStrategy::Parsed,
            PayloadStrategy::Repaired,
            PayloadStrategy::Absent,
            PayloadStrategy::Parsed,
        ];

        let stats = SummaryStats::collect(&records, &strategies);
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.with_questions, 2);
        assert_eq!(
            stats.type_counts.into_iter().collect::<Vec<_>>(),
            vec![
                ("".to_string(), 1),
                ("billing".to_string(), 1),
                ("shipping".to_string(), 2),
            ]
        );
        assert_eq!(
            stats.subtype_counts.into_iter().collect::<Vec<_>>(),
            vec![
                ("".to_string(), 2),
                ("delay".to_string(), 1),
                ("refund".to_string(), 1),
            ]
        );
        assert_eq!(stats.strategy_counts.get(&PayloadStrategy::Parsed), Some(&2));
        assert_eq!(stats.strategy_counts.get(&PayloadStrategy::RegexFallback), None);
    }

    #[test]
    fn test_strategy_breakdown_lists_every_strategy() {
        let stats = SummaryStats::collect(
            &[record("q", "t", ""), record("q", "t", "")],
            &[PayloadStrategy::Repaired, PayloadStrategy::Repaired],
        );
        assert_eq!(
            stats.strategy_breakdown(),
            vec![
                (PayloadStrategy::Parsed, 0),
                (PayloadStrategy::Repaired, 2),
                (PayloadStrategy::RegexFallback, 0),
                (PayloadStrategy::Absent, 0),
            ]
        );
        assert_eq!(
            SummaryStats::default().strategy_breakdown().iter().map(|(_, n)| n).sum::<usize>(),
            0
        );
    }

    #[test]
    fn test_preview_slice_caps_at_limit_and_length() {
        let records = vec![record("a", "", ""), record("b", "", ""), record("c", "", "")];
        assert!(preview_slice(&records, 0).is_empty());
        assert_eq!(preview_slice(&records, 2), &records[..2]);
        assert_eq!(preview_slice(&records, 5).len(), 3);
        assert!(preview_slice(&[], 5).is_empty());
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("exactly", 7), "exactly");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("请在设置页面重置密码", 4), "请在设置...");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(2_045)), "2.045s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1h 2m 5s");
    }
}
