use crate::domain::prediction::{DatasetKey, DatasetKind, Prediction, Scope, Source};
use crate::store::snapshot::CacheSnapshot;

impl CacheSnapshot {
    pub fn visible_for(&self, kind: DatasetKind, scope: Scope) -> &[Prediction] {
        self.dataset(DatasetKey::new(Source::for_scope(scope), kind))
    }

    pub fn visible(&self, kind: DatasetKind) -> &[Prediction] {
        self.visible_for(kind, self.active_scope)
    }
}
