// ==========================================
// 分批导入引擎 - 导入会话
// ==========================================
// 职责: 单个导入任务的游标（状态 + 位置 + 总数）
// 约束: position 单调不减；CLOSED 后不可再推进
// ==========================================

use crate::domain::types::SessionState;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// Session - 导入会话
// ==========================================
// 每次顶层导入、每个二次导入子任务各自创建一个，
// 由创建它的导入循环独占
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub state: SessionState,
    pub position: u64,                // 已提交的记录偏移
    pub total_count: Option<u64>,     // 读取器统计出的总记录数（仅供展示）
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// 创建新会话（OPEN, position = 0）
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            state: SessionState::Open,
            position: 0,
            total_count: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// 推进会话
    ///
    /// # 参数
    /// - position: 本批处理后的新位置
    /// - end_of_input: 读取器是否已到达输入末尾
    ///
    /// # 返回
    /// - Err(SessionClosed): 会话已关闭
    /// - Err(PositionRegression): 新位置小于当前位置
    pub fn advance(&mut self, position: u64, end_of_input: bool) -> ImportResult<()> {
        if self.is_closed() {
            return Err(ImportError::SessionClosed(self.session_id.clone()));
        }

        if position < self.position {
            return Err(ImportError::PositionRegression {
                session_id: self.session_id.clone(),
                current: self.position,
                requested: position,
            });
        }

        self.position = position;
        if end_of_input {
            self.state = SessionState::Closed;
        }
        self.updated_at = Utc::now();

        Ok(())
    }

    /// 记录总数（仅供进度展示，不参与循环判定）
    pub fn set_total_count(&mut self, total: u64) {
        self.total_count = Some(total);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_open_at_zero() {
        let session = Session::new();
        assert!(session.is_open());
        assert_eq!(session.position, 0);
        assert_eq!(session.total_count, None);
    }

    #[test]
    fn test_advance_closes_on_end_of_input() {
        let mut session = Session::new();
        session.advance(50, false).unwrap();
        assert!(session.is_open());

        session.advance(120, true).unwrap();
        assert!(session.is_closed());
        assert_eq!(session.position, 120);
    }

    #[test]
    fn test_advance_rejects_regression() {
        let mut session = Session::new();
        session.advance(50, false).unwrap();

        let err = session.advance(10, false).unwrap_err();
        assert!(matches!(
            err,
            ImportError::PositionRegression { current: 50, requested: 10, .. }
        ));
        assert_eq!(session.position, 50);
    }

    #[test]
    fn test_closed_session_never_reopens() {
        let mut session = Session::new();
        session.advance(0, true).unwrap();

        let err = session.advance(0, false).unwrap_err();
        assert!(matches!(err, ImportError::SessionClosed(_)));
        assert!(session.is_closed());
    }

    #[test]
    fn test_same_position_is_allowed() {
        let mut session = Session::new();
        session.advance(0, false).unwrap();
        session.advance(0, true).unwrap();
        assert!(session.is_closed());
    }
}
