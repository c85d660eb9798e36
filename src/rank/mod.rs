use chrono::{DateTime, Utc};

use crate::metadata::VideoRecord;

/// Parse a textual counter, defaulting to 0 on failure
fn parse_count(text: &str) -> u64 {
    text.trim().parse().unwrap_or(0)
}

/// Age of a record in whole hours at `now`, floored at 1 to keep the score
/// finite for freshly published videos.
fn hours_age(record: &VideoRecord, now: DateTime<Utc>) -> f64 {
    let published = DateTime::parse_from_rfc3339(&record.published_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    let hours = (now - published).num_seconds() as f64 / 3600.0;
    hours.max(1.0)
}

/// Virality score for a single record:
/// `(views + likes*5 + comments*10) / hours_age`
pub fn virality_score(record: &VideoRecord, now: DateTime<Utc>) -> f64 {
    let views = parse_count(&record.view_count) as f64;
    let likes = parse_count(&record.like_count) as f64;
    let comments = parse_count(&record.comment_count) as f64;
    let engagement_weight = likes * 5.0 + comments * 10.0;
    (views + engagement_weight) / hours_age(record, now)
}

/// Engagement rate: interactions per view
pub fn engagement_rate(record: &VideoRecord) -> f64 {
    let views = parse_count(&record.view_count).max(1) as f64;
    let likes = parse_count(&record.like_count) as f64;
    let comments = parse_count(&record.comment_count) as f64;
    (likes + comments) / views
}

/// Score every record, sort descending by virality score, and assign
/// 1-based ranks.
///
/// The sort is stable, so records with equal scores keep their input order.
pub fn apply_virality_ranking(records: &mut Vec<VideoRecord>, now: DateTime<Utc>) {
    for record in records.iter_mut() {
        record.virality_score = Some(virality_score(record, now));
        record.engagement_rate = Some(engagement_rate(record));
    }

    records.sort_by(|a, b| {
        let sa = a.virality_score.unwrap_or(0.0);
        let sb = b.virality_score.unwrap_or(0.0);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });

    for (index, record) in records.iter_mut().enumerate() {
        record.rank = Some(index + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, views: &str, likes: &str, comments: &str, published_at: String) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            url: VideoRecord::watch_url(id),
            title: format!("video {id}"),
            channel_title: "channel".to_string(),
            channel_id: "UCuAXFkgsw1L7xaCfnd5JJOw".to_string(),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            description: String::new(),
            view_count: views.to_string(),
            like_count: likes.to_string(),
            comment_count: comments.to_string(),
            published_at,
            duration: "PT3M".to_string(),
            virality_score: None,
            engagement_rate: None,
            rank: None,
            transcript: None,
        }
    }

    #[test]
    fn test_score_formula() {
        let now = Utc::now();
        let published = (now - Duration::hours(10)).to_rfc3339();
        let r = record("aaaaaaaaaaa", "1000", "100", "10", published);
        // (1000 + 100*5 + 10*10) / 10
        assert!((virality_score(&r, now) - 160.0).abs() < 1.0);
    }

    #[test]
    fn test_older_video_scores_half() {
        let now = Utc::now();
        let newer = record("aaaaaaaaaaa", "5000", "50", "5", (now - Duration::hours(10)).to_rfc3339());
        let older = record("bbbbbbbbbbb", "5000", "50", "5", (now - Duration::hours(20)).to_rfc3339());

        let newer_score = virality_score(&newer, now);
        let older_score = virality_score(&older, now);
        assert!((older_score - newer_score / 2.0).abs() < newer_score * 0.01);
    }

    #[test]
    fn test_fresh_video_age_floor() {
        let now = Utc::now();
        let r = record("aaaaaaaaaaa", "3600", "0", "0", (now - Duration::minutes(5)).to_rfc3339());
        // Divisor floors at 1 hour
        assert!((virality_score(&r, now) - 3600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unparseable_counts_default_to_zero() {
        let now = Utc::now();
        let r = record("aaaaaaaaaaa", "n/a", "", "oops", (now - Duration::hours(2)).to_rfc3339());
        assert_eq!(virality_score(&r, now), 0.0);
    }

    #[test]
    fn test_sort_descending_with_stable_ties() {
        let now = Utc::now();
        let ts = (now - Duration::hours(10)).to_rfc3339();
        let mut records = vec![
            record("aaaaaaaaaaa", "100", "0", "0", ts.clone()),
            record("bbbbbbbbbbb", "900", "0", "0", ts.clone()),
            record("ccccccccccc", "100", "0", "0", ts.clone()),
        ];

        apply_virality_ranking(&mut records, now);

        assert_eq!(records[0].id, "bbbbbbbbbbb");
        assert_eq!(records[0].rank, Some(1));
        // Equal scores keep input order: a before c
        assert_eq!(records[1].id, "aaaaaaaaaaa");
        assert_eq!(records[2].id, "ccccccccccc");
        assert_eq!(records[2].rank, Some(3));
    }

    #[test]
    fn test_engagement_rate() {
        let now = Utc::now();
        let r = record("aaaaaaaaaaa", "1000", "80", "20", now.to_rfc3339());
        assert!((engagement_rate(&r) - 0.1).abs() < f64::EPSILON);
    }
}
