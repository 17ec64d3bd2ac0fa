//! Refuse to publish private posts.
//!
//! Runs first in the write stage. Unless `build.allow_private` is set, every
//! post flagged `private = true` is an offender and the build halts with a
//! single critical error naming all of them, so nothing reaches disk.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::Plugin;
use crate::stage::{Priority, Stage};

pub struct PrivateGuard;

impl Plugin for PrivateGuard {
    fn name(&self) -> &str {
        "private-guard"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Write]
    }

    fn priority(&self, _stage: Stage) -> i32 {
        Priority::FIRST
    }

    fn write(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        if ctx.config().build.allow_private {
            return Ok(());
        }
        let offenders: Vec<BuildError> = ctx
            .posts
            .iter()
            .filter(|p| p.meta_bool("private"))
            .map(|p| {
                BuildError::critical(format!(
                    "{} is marked private and build.allow_private is off",
                    p.path()
                ))
            })
            .collect();
        match BuildError::join(offenders) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
