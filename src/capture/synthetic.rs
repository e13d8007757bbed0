//! Deterministic capture source and pose estimator.
//!
//! Used by the CLI simulator and tests. The estimator turns frame sequence
//! numbers into landmarks by following a [`PostureScript`], adding small
//! seeded jitter so the pipeline sees realistic noise while staying
//! reproducible.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{CaptureSource, Frame, PoseEstimator, SourceStatus};
use crate::error::CaptureError;
use crate::metrics::{Landmark, LandmarkFrame, LandmarkIndex};

/// Posture the synthetic estimator reports for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedPosture {
    Upright,
    /// Head pushed forward of the shoulders; closes the neck angle
    ForwardHead,
    /// Shoulders rolled forward in depth
    Slumped,
    HeadTilted,
    Leaning,
    /// Nobody in frame; a detection gap
    Absent,
}

impl ScriptedPosture {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "good" | "upright" => Some(ScriptedPosture::Upright),
            "bad" | "forward" => Some(ScriptedPosture::ForwardHead),
            "slump" => Some(ScriptedPosture::Slumped),
            "tilt" => Some(ScriptedPosture::HeadTilted),
            "lean" => Some(ScriptedPosture::Leaning),
            "absent" | "gap" => Some(ScriptedPosture::Absent),
            _ => None,
        }
    }
}

/// Sequence of (posture, frame count) segments
///
/// Frames past the end of the script repeat the last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostureScript {
    segments: Vec<(ScriptedPosture, u64)>,
}

impl PostureScript {
    pub fn new(segments: Vec<(ScriptedPosture, u64)>) -> Self {
        Self { segments }
    }

    /// Upright forever
    pub fn upright() -> Self {
        Self::new(vec![(ScriptedPosture::Upright, 1)])
    }

    /// Total frames covered before the last segment starts repeating
    pub fn len(&self) -> u64 {
        self.segments.iter().map(|(_, frames)| frames).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn posture_at(&self, sequence: u64) -> ScriptedPosture {
        let mut remaining = sequence;
        for (posture, frames) in &self.segments {
            if remaining < *frames {
                return *posture;
            }
            remaining -= frames;
        }
        self.segments
            .last()
            .map(|(posture, _)| *posture)
            .unwrap_or(ScriptedPosture::Upright)
    }
}

impl FromStr for PostureScript {
    type Err = String;

    /// Parse `good:30,bad:40,good:10`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let segments = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (name, count) = part
                    .split_once(':')
                    .ok_or_else(|| format!("segment '{}' must look like name:frames", part))?;
                let posture = ScriptedPosture::parse(name.trim())
                    .ok_or_else(|| format!("unknown posture '{}'", name))?;
                let frames = count
                    .trim()
                    .parse::<u64>()
                    .map_err(|err| format!("bad frame count in '{}': {}", part, err))?;
                Ok((posture, frames))
            })
            .collect::<Result<Vec<_>, String>>()?;

        if segments.is_empty() {
            return Err("script has no segments".to_string());
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for PostureScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|(posture, frames)| format!("{:?}:{}", posture, frames))
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Scripted camera with controllable status and acquisition failures
#[derive(Debug)]
pub struct ScriptedCapture {
    acquired: AtomicBool,
    paused: AtomicBool,
    failing_acquires: AtomicU32,
    sequence: AtomicU64,
    acquires: AtomicU64,
    releases: AtomicU64,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self {
            acquired: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            failing_acquires: AtomicU32::new(0),
            sequence: AtomicU64::new(0),
            acquires: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    pub fn set_status(&self, status: SourceStatus) {
        self.paused
            .store(status == SourceStatus::Paused, Ordering::SeqCst);
    }

    /// Make the next `count` acquisitions fail
    pub fn fail_next_acquires(&self, count: u32) {
        self.failing_acquires.store(count, Ordering::SeqCst);
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn acquire_count(&self) -> u64 {
        self.acquires.load(Ordering::SeqCst)
    }

    /// Releases of an acquired source; releasing an idle source is not counted
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    /// Frames delivered so far
    pub fn frames_delivered(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for ScriptedCapture {
    fn acquire(&self) -> Result<(), CaptureError> {
        let failing = self.failing_acquires.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_acquires.store(failing - 1, Ordering::SeqCst);
            return Err(CaptureError::AcquireFailed {
                reason: "camera busy".to_string(),
            });
        }
        if self.acquired.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AcquireFailed {
                reason: "camera already acquired".to_string(),
            });
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        if self.acquired.swap(false, Ordering::SeqCst) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn status(&self) -> SourceStatus {
        if self.paused.load(Ordering::SeqCst) {
            SourceStatus::Paused
        } else {
            SourceStatus::Active
        }
    }

    fn next_frame(&self) -> Result<Frame, CaptureError> {
        if !self.is_acquired() {
            return Err(CaptureError::NotRunning);
        }
        if self.status() == SourceStatus::Paused {
            return Err(CaptureError::Stalled);
        }
        Ok(Frame {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            width: 640,
            height: 480,
            pixels: Vec::new(),
        })
    }
}

/// Pose estimator following a [`PostureScript`]
pub struct SyntheticPoseEstimator {
    script: PostureScript,
    rng: Mutex<StdRng>,
    jitter: f32,
    unmirrored: bool,
    faults: Mutex<BTreeSet<u64>>,
}

impl SyntheticPoseEstimator {
    /// Default landmark jitter in normalized coordinates
    pub const DEFAULT_JITTER: f32 = 0.001;

    pub fn new(script: PostureScript, seed: u64) -> Self {
        Self {
            script,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            jitter: Self::DEFAULT_JITTER,
            unmirrored: false,
            faults: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter.abs();
        self
    }

    /// Report landmarks as a raw (unmirrored) camera sees them
    ///
    /// The subject's left side lands on the image right, which puts both
    /// tilt metrics near ±180 degrees.
    pub fn unmirrored(mut self) -> Self {
        self.unmirrored = true;
        self
    }

    /// Fail detection once for the frame with `sequence`
    pub fn fail_at(&self, sequence: u64) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sequence);
    }

    pub fn script(&self) -> &PostureScript {
        &self.script
    }

    fn landmarks(&self, posture: ScriptedPosture) -> Option<LandmarkFrame> {
        let mut points = [
            (LandmarkIndex::Nose, Landmark::new(0.50, 0.28, -0.10)),
            (LandmarkIndex::LeftEar, Landmark::new(0.42, 0.30, -0.05)),
            (LandmarkIndex::RightEar, Landmark::new(0.58, 0.30, -0.05)),
            (LandmarkIndex::LeftShoulder, Landmark::new(0.40, 0.55, 0.0)),
            (LandmarkIndex::RightShoulder, Landmark::new(0.60, 0.55, 0.0)),
            (LandmarkIndex::LeftHip, Landmark::new(0.41, 0.90, 0.0)),
            (LandmarkIndex::RightHip, Landmark::new(0.59, 0.90, 0.0)),
        ];

        let shift = |points: &mut [(LandmarkIndex, Landmark)],
                     index: LandmarkIndex,
                     dx: f32,
                     dy: f32,
                     dz: f32| {
            for (at, landmark) in points.iter_mut() {
                if *at == index {
                    landmark.x += dx;
                    landmark.y += dy;
                    landmark.z += dz;
                }
            }
        };

        match posture {
            ScriptedPosture::Upright => {}
            ScriptedPosture::ForwardHead => {
                for ear in [LandmarkIndex::LeftEar, LandmarkIndex::RightEar, LandmarkIndex::Nose] {
                    shift(&mut points, ear, -0.15, 0.03, 0.0);
                }
            }
            ScriptedPosture::Slumped => {
                for shoulder in [LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder] {
                    shift(&mut points, shoulder, 0.0, 0.0, -0.15);
                }
            }
            ScriptedPosture::HeadTilted => shift(&mut points, LandmarkIndex::RightEar, 0.0, 0.06, 0.0),
            ScriptedPosture::Leaning => {
                shift(&mut points, LandmarkIndex::RightShoulder, 0.0, 0.06, 0.0)
            }
            ScriptedPosture::Absent => return None,
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if self.jitter > 0.0 {
            for (_, landmark) in points.iter_mut() {
                landmark.x += rng.gen_range(-self.jitter..=self.jitter);
                landmark.y += rng.gen_range(-self.jitter..=self.jitter);
            }
        }
        for (_, landmark) in points.iter_mut() {
            landmark.visibility = Some(rng.gen_range(0.85..=1.0));
            if self.unmirrored {
                landmark.x = 1.0 - landmark.x;
            }
        }

        Some(LandmarkFrame::from_pairs(points))
    }
}

impl PoseEstimator for SyntheticPoseEstimator {
    fn detect(&self, frame: &Frame, _timestamp: Instant) -> Result<Option<LandmarkFrame>, CaptureError> {
        let faulted = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&frame.sequence);
        if faulted {
            return Err(CaptureError::Fault {
                details: format!("model failed on frame {}", frame.sequence),
            });
        }

        Ok(self.landmarks(self.script.posture_at(frame.sequence)))
    }
}
