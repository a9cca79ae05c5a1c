use anyhow::Result;
use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::bridge::{Bridge, Origin, Recipient, Request, WorkItem};

/// A daily gold report sent to one chat at a fixed local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub recipient: Recipient,
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

impl ScheduledJob {
    pub fn cron(&self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }
}

pub fn daily_jobs(recipient: Recipient, times: &[(u32, u32)], timezone: Tz) -> Vec<ScheduledJob> {
    times
        .iter()
        .map(|&(hour, minute)| ScheduledJob {
            recipient,
            hour,
            minute,
            timezone,
        })
        .collect()
}

/// Registers every job and starts the scheduler. Each tick only submits to
/// the bridge; rendering and delivery happen on the bridge loop.
pub async fn start(jobs: &[ScheduledJob], bridge: Bridge) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    for job in jobs {
        let recipient = job.recipient;
        let bridge = bridge.clone();

        sched
            .add(Job::new_async_tz(
                job.cron().as_str(),
                job.timezone,
                move |_uuid, _l| {
                    let bridge = bridge.clone();
                    Box::pin(async move {
                        let item = WorkItem {
                            origin: Origin::Schedule,
                            recipient,
                            request: Request::ScheduledGold,
                        };
                        match bridge.submit(item) {
                            Ok(job_id) => {
                                info!(job_id, recipient, "scheduled gold report queued")
                            }
                            Err(e) => {
                                error!(recipient, error = %e, "scheduled gold report dropped")
                            }
                        }
                    })
                },
            )?)
            .await?;

        info!(
            hour = job.hour,
            minute = job.minute,
            timezone = %job.timezone,
            "gold report scheduled"
        );
    }

    sched.start().await?;
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use chrono_tz::Asia::Ho_Chi_Minh;

    use super::*;

    #[test]
    fn test_cron_expression() {
        let jobs = daily_jobs(7, &[(8, 0), (20, 30)], Ho_Chi_Minh);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].cron(), "0 0 8 * * *");
        assert_eq!(jobs[1].cron(), "0 30 20 * * *");
        assert!(jobs.iter().all(|j| j.recipient == 7 && j.timezone == Ho_Chi_Minh));
    }
}
