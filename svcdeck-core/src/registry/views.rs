//! 派生视图：每次调用都从当前集合投影，不做缓存。

use super::*;
use crate::models::Status;
use crate::resource::ResourceState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub services: usize,
    pub directories: usize,
    pub running: usize,
    pub stopped: usize,
    pub loading: usize,
}

impl Registry {
    /// 全部资源，按来源顺序
    pub fn items(&self) -> Vec<Resource> {
        self.items_guard().ordered()
    }

    pub fn services(&self) -> Vec<Resource> {
        self.filtered(|r| r.is_service())
    }

    pub fn directories(&self) -> Vec<Resource> {
        self.filtered(|r| r.is_directory())
    }

    pub fn running(&self) -> Vec<Resource> {
        self.filtered(|r| r.is_service() && r.is_running())
    }

    pub fn stopped(&self) -> Vec<Resource> {
        self.filtered(|r| r.is_service() && r.is_stopped())
    }

    pub fn counts(&self) -> Counts {
        self.snapshots()
            .iter()
            .fold(Counts::default(), |mut counts, state| {
                counts.total += 1;
                if state.config.is_service() {
                    counts.services += 1;
                    match state.status {
                        Status::Running => counts.running += 1,
                        Status::Stopped => counts.stopped += 1,
                        _ => {}
                    }
                } else {
                    counts.directories += 1;
                }
                if state.loading {
                    counts.loading += 1;
                }
                counts
            })
    }

    /// 所有实体的状态快照，按来源顺序
    pub fn snapshots(&self) -> Vec<ResourceState> {
        self.items().iter().map(Resource::snapshot).collect()
    }

    fn filtered(&self, keep: impl Fn(&Resource) -> bool) -> Vec<Resource> {
        self.items().into_iter().filter(|r| keep(r)).collect()
    }
}
