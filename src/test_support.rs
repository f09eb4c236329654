//! 单元测试辅助：内存工作表与脚本化 LLM

use std::sync::Mutex;

use async_trait::async_trait;
use calamine::{Cell, Data, Range};

use crate::error::LlmError;
use crate::models::Sheet;
use crate::services::llm_service::{EnrichmentRequest, LanguageModel};

/// 用 1 起的 (行, 列) 构建工作表，单元格顺序任意
pub fn sheet_with(cells: &[(u32, u32, Data)]) -> Sheet {
    let mut cells: Vec<Cell<Data>> = cells
        .iter()
        .map(|(row, col, value)| Cell::new((row - 1, col - 1), value.clone()))
        .collect();
    // from_sparse 按行优先读取首尾单元格来确定范围
    cells.sort_by_key(|cell| cell.get_position());

    Sheet {
        name: "Sheet1".to_string(),
        cells: Range::from_sparse(cells),
        pictures: Vec::new(),
    }
}

/// 脚本中的一步
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(String),
    /// 永不返回（用于超时测试）
    Hang,
}

/// 按脚本依次应答的假模型，脚本用完后重复最后一步
pub struct ScriptedModel {
    steps: Vec<Step>,
    requests: Mutex<Vec<EnrichmentRequest>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Step::Reply(text.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<EnrichmentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, LlmError> {
        let step = {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len().min(self.steps.len().saturating_sub(1));
            requests.push(request.clone());
            self.steps.get(index).cloned()
        };

        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(message)) => Err(LlmError::Rejected(message)),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(LlmError::Rejected("脚本为空".to_string())),
        }
    }
}
