use async_trait::async_trait;
use s3nb_types::ContentsModel;

use crate::error::ContentsResult;

/// Runs on every save, before the payload is decoded. The hook may rewrite
/// the model or reject it.
#[async_trait]
pub trait PreSaveHook: Send + Sync {
    async fn pre_save(&self, model: &mut ContentsModel, path: &str) -> ContentsResult<()>;
}

pub struct NoOpHook;

#[async_trait]
impl PreSaveHook for NoOpHook {
    async fn pre_save(&self, _model: &mut ContentsModel, _path: &str) -> ContentsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_hook_leaves_model_alone() {
        let mut model = ContentsModel::directory();
        let before = model.clone();
        NoOpHook.pre_save(&mut model, "dir").await.unwrap();
        assert_eq!(model, before);
    }
}
