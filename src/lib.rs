//! Dubline - Automated Video Dubbing Pipeline
//!
//! Splits a video into picture and speech, has remote functions transcribe,
//! translate and re-voice the speech, then remuxes the new audio with the
//! original picture using ffmpeg.

pub mod cli;
pub mod config;
pub mod workflow;
pub mod transcribe;
pub mod subtitle;
pub mod media;
pub mod error;
pub mod functions;
pub mod poller;
pub mod storage;
pub mod setup;
