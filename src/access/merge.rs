use super::statuses::StatusMap;
use crate::models::{Song, SongStatus, SongWithStatus};

/// Status reported for a visible song with no recorded lesson status.
pub const DEFAULT_SONG_STATUS: SongStatus = SongStatus::ToLearn;

pub fn with_status(song: Song, statuses: &StatusMap) -> SongWithStatus {
    let status = statuses
        .get(&song.id)
        .copied()
        .unwrap_or(DEFAULT_SONG_STATUS);
    SongWithStatus { song, status }
}

/// Attach each song's status. Pure and order-preserving.
pub fn merge(songs: Vec<Song>, statuses: &StatusMap) -> Vec<SongWithStatus> {
    songs
        .into_iter()
        .map(|song| with_status(song, statuses))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SongLevel;
    use chrono::Utc;
    use uuid::Uuid;

    fn song(title: &str) -> Song {
        Song {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: "Unknown".to_string(),
            level: SongLevel::Beginner,
            key: None,
            chords: None,
            audio_files: Vec::new(),
            ultimate_guitar_link: None,
            short_title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn known_status_is_attached_and_unknown_defaults() {
        let started = song("Wonderwall");
        let untouched = song("Blackbird");
        let statuses = StatusMap::from([(started.id, SongStatus::Started)]);

        let merged = merge(vec![started.clone(), untouched.clone()], &statuses);

        assert_eq!(merged[0].song, started);
        assert_eq!(merged[0].status, SongStatus::Started);
        assert_eq!(merged[1].song, untouched);
        assert_eq!(merged[1].status, SongStatus::ToLearn);
    }

    #[test]
    fn preserves_input_order() {
        let songs = vec![song("C"), song("A"), song("B")];

        let merged = merge(songs.clone(), &StatusMap::new());

        let titles: Vec<&str> = merged.iter().map(|s| s.song.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }

    #[test]
    fn merging_twice_gives_identical_output() {
        let songs = vec![song("Wonderwall"), song("Blackbird")];
        let statuses = StatusMap::from([(songs[1].id, SongStatus::Mastered)]);

        let first = merge(songs.clone(), &statuses);
        let second = merge(songs, &statuses);

        assert_eq!(first, second);
    }

    #[test]
    fn default_status_serializes_as_to_learn() {
        let merged = with_status(song("Blackbird"), &StatusMap::new());
        let json = serde_json::to_value(&merged).expect("serializable");

        assert_eq!(json["status"], "to_learn");
        assert_eq!(json["title"], "Blackbird");
    }
}
