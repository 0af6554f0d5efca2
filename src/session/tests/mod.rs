use super::test_helpers::*;
use super::*;
use crate::error::{DownloadError, Error};
use crate::types::{DownloadParams, JobId, Phase, SessionEvent};
