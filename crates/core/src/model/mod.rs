mod ids;
mod leaderboard;
mod progress;
mod score;
mod session;

pub use ids::{ParseIdError, SessionId, UserKey, UserKeyError};
pub use leaderboard::{LeaderboardOrder, LeaderboardOrderError};
pub use progress::{
    ProgressError, ProgressParts, ProgressStats, RecentSession, RecentSessions, UserProgress,
    WeeklyStats,
};
pub use score::{FluencyScore, ScoreError};
pub use session::{
    Correction, CorrectionCategory, NewSession, Session, SessionRecordError, SessionSource,
};
