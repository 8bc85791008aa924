use chrono::Duration;
use talk_core::gamification::{SessionOutcome, apply_session};
use talk_core::model::{
    FluencyScore, LeaderboardOrder, NewSession, Session, SessionId, SessionSource, UserKey,
    UserProgress,
};
use talk_core::time::fixed_now;
use talk_core::CalendarZone;
use talk_storage::json_file::JsonFileRepository;
use talk_storage::repository::{ProgressRepository, SessionRepository, StorageError};

fn build_session(user: &UserKey, score: i64, hours_ago: i64) -> Session {
    Session::new(
        SessionId::generate(),
        NewSession {
            user: user.clone(),
            transcript: "I am agree with you.".into(),
            corrected: "I agree with you.".into(),
            score: FluencyScore::new(score).unwrap(),
            reply: "Why do you agree?".into(),
            feedback: String::new(),
            corrections: vec![],
            source: SessionSource::Text,
        },
        fixed_now() - Duration::hours(hours_ago),
    )
    .unwrap()
}

#[tokio::test]
async fn missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("nested").join("data.json"));

    assert!(repo.list_all_sessions(10).await.unwrap().is_empty());
    assert!(repo.get_progress(&UserKey::anonymous()).await.unwrap().is_none());
    assert!(!repo.path().exists());
}

#[tokio::test]
async fn sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let user = UserKey::new("lee").unwrap();

    let older = build_session(&user, 5, 48);
    let newer = build_session(&user, 9, 1);
    {
        let repo = JsonFileRepository::new(&path);
        repo.append_session(&older).await.unwrap();
        repo.append_session(&newer).await.unwrap();
        assert!(matches!(
            repo.append_session(&newer).await,
            Err(StorageError::Conflict)
        ));
    }

    let reopened = JsonFileRepository::new(&path);
    let listed = reopened.list_user_sessions(&user, 10).await.unwrap();
    assert_eq!(listed, vec![newer.clone(), older.clone()]);

    let window = reopened
        .sessions_between(&user, fixed_now() - Duration::days(1), fixed_now())
        .await
        .unwrap();
    assert_eq!(window, vec![newer.clone()]);
    assert_eq!(reopened.get_session(older.id()).await.unwrap(), older);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"transcript\": \"I am agree with you.\""));
}

#[tokio::test]
async fn progress_upserts_ranks_and_resets() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonFileRepository::new(dir.path().join("data.json"));
    let zone = CalendarZone::utc();
    let week = zone.week_start_of(fixed_now());

    let mut kim = UserProgress::new(UserKey::new("kim").unwrap(), week);
    let mut max = UserProgress::new(UserKey::new("max").unwrap(), week);
    for (p, score) in [(&mut kim, 9), (&mut max, 4)] {
        apply_session(
            p,
            SessionOutcome {
                score: FluencyScore::new(score).unwrap(),
                source: SessionSource::Text,
            },
            fixed_now(),
            zone,
        );
    }
    repo.save_progress(&kim).await.unwrap();
    repo.save_progress(&max).await.unwrap();
    repo.save_progress(&kim).await.unwrap();

    let board = repo.leaderboard(LeaderboardOrder::Xp, 10).await.unwrap();
    assert_eq!(board, vec![kim.clone(), max.clone()]);

    let changed = repo
        .reset_stale_weekly_stats(week + Duration::days(7))
        .await
        .unwrap();
    assert_eq!(changed, 2);
    let kim_loaded = repo.get_progress(kim.user()).await.unwrap().unwrap();
    assert_eq!(kim_loaded.weekly_stats().current_week_xp, 0);
    assert_eq!(kim_loaded.total_xp(), 15);
}

#[tokio::test]
async fn corrupt_file_is_a_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, "{ not json").unwrap();
    let repo = JsonFileRepository::new(&path);
    assert!(matches!(
        repo.list_all_sessions(5).await,
        Err(StorageError::Serialization(_))
    ));
}
