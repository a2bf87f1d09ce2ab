//! Background mesh loading
//!
//! Decoding runs on a worker thread; results come back to the main loop
//! through a channel, which drains them once per frame with [`MeshLoader::poll`].
//! The worker never touches UI state. It only mints mesh ids and hands over
//! decoded geometry.
//!
//! ```text
//! Main Thread                       Loader Thread
//!     │                                  │
//! [request(paths)]──────(spawn)────────►[load_mesh_file]
//!     │                                  │
//! [poll]◄──────────(channel)────────────[LoadEvent]
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::{FileSettings, MeshSettings};
use crate::scene::SceneMesh;
use crate::state::MeshId;
use crate::stl::load_mesh_file;

/// Identifies one call to [`MeshLoader::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

#[derive(Debug)]
pub struct LoadedMesh {
    pub request: RequestId,
    /// Freshly minted, unique for the lifetime of the loader
    pub id: MeshId,
    pub name: String,
    pub path: PathBuf,
    pub mesh: SceneMesh,
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress {
        request: RequestId,
        /// 0.0 ..= 1.0
        fraction: f32,
        message: String,
    },
    Loaded(Box<LoadedMesh>),
    Failed {
        request: RequestId,
        path: PathBuf,
        message: String,
    },
    Finished {
        request: RequestId,
        loaded: usize,
        canceled: bool,
    },
}

struct ActiveRequest {
    id: RequestId,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Everything a worker needs, cloned out of the loader.
struct Job {
    request: RequestId,
    paths: Vec<PathBuf>,
    files: FileSettings,
    limits: MeshSettings,
    next_id: Arc<AtomicU64>,
    cancel: Arc<AtomicBool>,
    tx: Sender<LoadEvent>,
}

pub struct MeshLoader {
    files: FileSettings,
    limits: MeshSettings,
    next_id: Arc<AtomicU64>,
    next_request: u64,
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
    active: Vec<ActiveRequest>,
}

impl MeshLoader {
    pub fn new(files: FileSettings, limits: MeshSettings) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            files,
            limits,
            next_id: Arc::new(AtomicU64::new(1)),
            next_request: 1,
            tx,
            rx,
            active: Vec::new(),
        }
    }

    /// Start loading `paths` in the background. Returns immediately.
    pub fn request(&mut self, paths: Vec<PathBuf>) -> std::io::Result<RequestId> {
        let request = RequestId(self.next_request);
        self.next_request += 1;
        let cancel = Arc::new(AtomicBool::new(false));

        let job = Job {
            request,
            paths,
            files: self.files.clone(),
            limits: self.limits.clone(),
            next_id: Arc::clone(&self.next_id),
            cancel: Arc::clone(&cancel),
            tx: self.tx.clone(),
        };
        debug!("Spawning loader for request {:?} ({} files)", request, job.paths.len());
        let handle = thread::Builder::new()
            .name("mesh-loader".to_string())
            .spawn(move || job.run())?;

        self.active.push(ActiveRequest {
            id: request,
            cancel,
            handle: Some(handle),
        });
        Ok(request)
    }

    /// Ask a request to stop after the file it is currently decoding.
    pub fn cancel(&self, request: RequestId) -> bool {
        match self.active.iter().find(|a| a.id == request) {
            Some(active) => {
                active.cancel.store(true, Ordering::Relaxed);
                info!("Canceling load request {:?}", request);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for active in &self.active {
            active.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Drain every event produced since the last call.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let LoadEvent::Finished { request, .. } = &event {
                        self.retire(*request);
                    }
                    events.push(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    pub fn is_busy(&self) -> bool {
        !self.active.is_empty()
    }

    /// Most recent request still running
    pub fn current_request(&self) -> Option<RequestId> {
        self.active.last().map(|a| a.id)
    }

    fn retire(&mut self, request: RequestId) {
        if let Some(index) = self.active.iter().position(|a| a.id == request) {
            let mut active = self.active.remove(index);
            if let Some(handle) = active.handle.take() {
                if handle.join().is_err() {
                    warn!("Loader thread for request {:?} panicked", request);
                }
            }
        }
    }
}

impl Drop for MeshLoader {
    fn drop(&mut self) {
        self.cancel_all();
        for active in &mut self.active {
            if let Some(handle) = active.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Job {
    fn run(self) {
        let total = self.paths.len();
        let mut loaded = 0;
        let mut canceled = false;

        for (index, path) in self.paths.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                canceled = true;
                break;
            }

            let name = display_name(path);
            let progress = LoadEvent::Progress {
                request: self.request,
                fraction: index as f32 / total as f32,
                message: format!("Loading {} ({}/{})", name, index + 1, total),
            };
            if self.tx.send(progress).is_err() {
                return;
            }

            let event = match load_mesh_file(path, &self.files, &self.limits)
                .and_then(|mesh| SceneMesh::new(mesh, Some(path.clone())))
            {
                Ok(mesh) => {
                    let id = MeshId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                    info!(
                        "Loaded {} as mesh {} ({} triangles)",
                        path.display(),
                        id,
                        mesh.stats.triangles
                    );
                    loaded += 1;
                    LoadEvent::Loaded(Box::new(LoadedMesh {
                        request: self.request,
                        id,
                        name,
                        path: path.clone(),
                        mesh,
                    }))
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", path.display(), e);
                    LoadEvent::Failed {
                        request: self.request,
                        path: path.clone(),
                        message: e.to_string(),
                    }
                }
            };
            if self.tx.send(event).is_err() {
                return;
            }
        }

        let _ = self.tx.send(LoadEvent::Finished {
            request: self.request,
            loaded,
            canceled,
        });
    }
}

/// File name shown in the UI for a mesh loaded from `path`.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const TRIANGLE: &str = "solid part
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 1 0
  endloop
endfacet
endsolid part
";

    fn write_stl(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, TRIANGLE).unwrap();
        path
    }

    fn loader() -> MeshLoader {
        MeshLoader::new(FileSettings::default(), MeshSettings::default())
    }

    fn wait_for_finish(loader: &mut MeshLoader) -> Vec<LoadEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(loader.poll());
            if events
                .iter()
                .any(|e| matches!(e, LoadEvent::Finished { .. }))
            {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("loader did not finish");
    }

    #[test]
    fn test_loads_files_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_stl(&dir, "a.stl");
        let b = write_stl(&dir, "b.stl");
        let mut loader = loader();

        let request = loader.request(vec![a.clone(), b]).unwrap();
        assert!(loader.is_busy());
        let events = wait_for_finish(&mut loader);

        let loaded: Vec<&LoadedMesh> = events
            .iter()
            .filter_map(|e| match e {
                LoadEvent::Loaded(mesh) => Some(mesh.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "a.stl");
        assert_eq!(loaded[0].path, a);
        assert_eq!(loaded[0].request, request);
        assert_ne!(loaded[0].id, loaded[1].id);
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Finished { loaded: 2, canceled: false, .. })
        ));
        assert!(!loader.is_busy());
    }

    #[test]
    fn test_failures_are_reported_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_stl(&dir, "good.stl");
        let missing = dir.path().join("missing.stl");
        let wrong_type = dir.path().join("notes.txt");
        std::fs::write(&wrong_type, "hello").unwrap();

        let mut loader = loader();
        loader
            .request(vec![missing.clone(), wrong_type.clone(), good])
            .unwrap();
        let events = wait_for_finish(&mut loader);

        let failed: Vec<&PathBuf> = events
            .iter()
            .filter_map(|e| match e {
                LoadEvent::Failed { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(failed, vec![&missing, &wrong_type]);
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Finished { loaded: 1, .. })
        ));
    }

    #[test]
    fn test_ids_stay_unique_across_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stl(&dir, "part.stl");
        let mut loader = loader();

        let mut ids = Vec::new();
        for _ in 0..3 {
            loader.request(vec![path.clone()]).unwrap();
            for event in wait_for_finish(&mut loader) {
                if let LoadEvent::Loaded(mesh) = event {
                    ids.push(mesh.id);
                }
            }
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_canceled_job_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let job = Job {
            request: RequestId(9),
            paths: vec![write_stl(&dir, "a.stl"), write_stl(&dir, "b.stl")],
            files: FileSettings::default(),
            limits: MeshSettings::default(),
            next_id: Arc::new(AtomicU64::new(1)),
            cancel: Arc::new(AtomicBool::new(true)),
            tx,
        };
        job.run();

        let events: Vec<LoadEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            LoadEvent::Finished { loaded: 0, canceled: true, .. }
        ));
    }

    #[test]
    fn test_cancel_unknown_request() {
        let loader = loader();
        assert!(!loader.cancel(RequestId(42)));
        assert!(!loader.is_busy());
    }
}
