use anyhow::Result;
use console::style;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::metadata::VideoRecord;
use crate::pipeline::CANCELLED;
use crate::providers;

/// Save the final record sequence to a file
pub async fn save_to_file(records: &[VideoRecord], path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(records, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print the final record sequence to the console
pub fn print_to_console(records: &[VideoRecord], format: &OutputFormat) -> Result<()> {
    println!("{}", render(records, format)?);
    Ok(())
}

fn render(records: &[VideoRecord], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => Ok(format_as_csv(records)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Table => Ok(format_as_table(records)),
    }
}

const CSV_HEADER: &str = "id,url,title,channelTitle,publishedAt,duration,viewCount,likeCount,commentCount,viralityScore,engagementRate,rank,tags,transcript";

/// Render records as CSV, matching the dashboard's export columns
pub fn format_as_csv(records: &[VideoRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for r in records {
        let fields = [
            r.id.clone(),
            r.url.clone(),
            r.title.clone(),
            r.channel_title.clone(),
            r.published_at.clone(),
            r.duration.clone(),
            r.view_count.clone(),
            r.like_count.clone(),
            r.comment_count.clone(),
            r.virality_score.map(|s| format!("{s:.2}")).unwrap_or_default(),
            r.engagement_rate.map(|e| format!("{e:.4}")).unwrap_or_default(),
            r.rank.map(|n| n.to_string()).unwrap_or_default(),
            r.tags.join("|"),
            r.transcript.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Compact console table with per-row transcript status
pub fn format_as_table(records: &[VideoRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<12} {:>12} {:>10} {:<40} {}\n",
        "#", "ID", "Views", "Score", "Title", "Transcript"
    ));

    for (index, r) in records.iter().enumerate() {
        let rank = r.rank.map(|n| n.to_string()).unwrap_or_else(|| (index + 1).to_string());
        let score = r
            .virality_score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let title: String = r.title.chars().take(40).collect();
        out.push_str(&format!(
            "{:<4} {:<12} {:>12} {:>10} {:<40} {}\n",
            rank,
            r.id,
            r.view_count,
            score,
            title,
            transcript_status(r.transcript.as_deref())
        ));
    }

    out
}

fn transcript_status(transcript: Option<&str>) -> String {
    match transcript {
        None => style("-").dim().to_string(),
        Some(CANCELLED) => style(CANCELLED).yellow().to_string(),
        Some(text) if providers::is_error_text(text) => style(text).red().to_string(),
        Some(text) => style(format!("ok ({} chars)", text.len())).green().to_string(),
    }
}
