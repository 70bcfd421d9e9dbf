use crate::domain::prediction::{DatasetKey, DatasetKind, Prediction, Source};
use crate::store::snapshot::CacheSnapshot;

// Local edits never touch pagination or the freshness timestamp.
impl CacheSnapshot {
    pub fn add_local(&mut self, record: Prediction, kind: DatasetKind) -> DatasetKey {
        let key = DatasetKey::new(Source::for_scope(record.organization_access), kind);
        self.dataset_mut(key).insert(0, record);
        key
    }

    pub fn replace_local(
        &mut self,
        record: Prediction,
        kind: DatasetKind,
        placeholder_id: &str,
    ) -> bool {
        let key = DatasetKey::new(Source::for_scope(record.organization_access), kind);
        let dataset = self.dataset_mut(key);
        let Some(pos) = dataset.iter().position(|p| p.id == placeholder_id) else {
            return false;
        };

        let confirmed_id = record.id.clone();
        dataset[pos] = record;

        let mut idx = 0;
        dataset.retain(|p| {
            let keep = idx == pos || p.id != confirmed_id;
            idx += 1;
            keep
        });
        true
    }

    pub fn remove_local(&mut self, id: &str, kind: DatasetKind) -> usize {
        [Source::Scoped, Source::Platform]
            .into_iter()
            .map(|source| {
                let dataset = self.dataset_mut(DatasetKey::new(source, kind));
                let before = dataset.len();
                dataset.retain(|p| p.id != id);
                before - dataset.len()
            })
            .sum()
    }
}
