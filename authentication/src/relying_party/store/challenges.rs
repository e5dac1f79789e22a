use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AuthenticationError, AuthenticationErrorType};
use crate::security::challenge::Challenge;

#[derive(Debug)]
pub enum Request {
    Issue,
    Consume(Challenge),
}

#[derive(Debug)]
pub enum Response {
    Issued(Challenge),
    Consumed(Challenge),
    Rejected,
}

#[derive(Clone)]
pub struct ChallengesChannel {
    sender: mpsc::Sender<(Request, oneshot::Sender<Response>)>,
}

impl ChallengesChannel {
    pub async fn init() -> (
        ChallengesChannel,
        mpsc::Receiver<(Request, oneshot::Sender<Response>)>,
    ) {
        let (sender, receiver) = mpsc::channel(64);

        (ChallengesChannel { sender }, receiver)
    }

    pub async fn issue(&self) -> Result<Challenge, AuthenticationError> {
        match self.request(Request::Issue).await? {
            Response::Issued(challenge) => Ok(challenge),
            _ => Err(AuthenticationError {
                error: AuthenticationErrorType::StoreUnavailable,
            }),
        }
    }

    /// Removes `challenge` from the store. Unknown, already consumed and
    /// expired challenges are rejected.
    pub async fn consume(&self, challenge: &Challenge) -> Result<Challenge, AuthenticationError> {
        match self
            .request(Request::Consume(challenge.to_owned()))
            .await?
        {
            Response::Consumed(challenge) => Ok(challenge),
            Response::Rejected => Err(AuthenticationError {
                error: AuthenticationErrorType::ChallengeRejected,
            }),
            Response::Issued(_) => Err(AuthenticationError {
                error: AuthenticationErrorType::StoreUnavailable,
            }),
        }
    }

    async fn request(&self, request: Request) -> Result<Response, AuthenticationError> {
        let (sender, receiver) = oneshot::channel();
        let unavailable = AuthenticationError {
            error: AuthenticationErrorType::StoreUnavailable,
        };

        if let Err(error) = self.sender.send((request, sender)).await {
            log::error!("challenges channel | send -> {}", error);

            return Err(unavailable);
        }

        match receiver.await {
            Ok(response) => Ok(response),
            Err(error) => {
                log::error!("challenges channel | receive -> {}", error);

                Err(unavailable)
            }
        }
    }
}

pub struct Challenges {
    issued: HashMap<Challenge, DateTime<Utc>>,
    timeout: Duration,
    receiver: mpsc::Receiver<(Request, oneshot::Sender<Response>)>,
}

impl Challenges {
    pub async fn init(timeout_seconds: u64) -> (ChallengesChannel, Challenges) {
        let issued = HashMap::with_capacity(50);
        let timeout_seconds = i64::try_from(timeout_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let timeout = Duration::seconds(timeout_seconds);
        let (challenges_channel, receiver) = ChallengesChannel::init().await;

        (
            challenges_channel,
            Challenges {
                issued,
                timeout,
                receiver,
            },
        )
    }

    pub async fn run(&mut self) {
        while let Some((request, response)) = self.receiver.recv().await {
            let outcome = match request {
                Request::Issue => Response::Issued(self.issue()),
                Request::Consume(challenge) => match self.consume(&challenge) {
                    Some(challenge) => Response::Consumed(challenge),
                    None => Response::Rejected,
                },
            };

            let _ = response.send(outcome);
        }
    }

    fn issue(&mut self) -> Challenge {
        let now = Utc::now();

        self.prune(now);

        let challenge = Challenge::generate();

        self.issued.insert(challenge.to_owned(), now);

        challenge
    }

    fn consume(&mut self, challenge: &Challenge) -> Option<Challenge> {
        let issued_at = match self.issued.remove(challenge) {
            Some(issued_at) => issued_at,
            None => {
                log::warn!("challenge rejected | unknown or already consumed");

                return None;
            }
        };

        match Utc::now() - issued_at <= self.timeout {
            true => Some(challenge.to_owned()),
            false => {
                log::warn!("challenge rejected | issued at {} has expired", issued_at);

                None
            }
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let timeout = self.timeout;

        self.issued.retain(|_, issued_at| now - *issued_at <= timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init() -> Result<(), Box<dyn std::error::Error>> {
        let test_challenges = Challenges::init(300).await;

        assert!(test_challenges.0.sender.capacity() >= 50);
        assert!(test_challenges.1.issued.capacity() >= 50);
        assert_eq!(test_challenges.1.timeout, Duration::seconds(300));

        Ok(())
    }

    #[tokio::test]
    async fn issue_and_consume() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_challenges = Challenges::init(300).await;

        let test_issued = test_challenges.1.issue();

        assert_eq!(test_issued.as_bytes().len(), 32);
        assert_eq!(test_challenges.1.issued.len(), 1);
        assert_eq!(test_challenges.1.consume(&test_issued), Some(test_issued.to_owned()));
        assert!(test_challenges.1.issued.is_empty());
        assert!(test_challenges.1.consume(&test_issued).is_none());
        assert!(test_challenges.1.consume(&Challenge::generate()).is_none());

        Ok(())
    }

    #[tokio::test]
    async fn expired() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_challenges = Challenges::init(300).await;
        let test_expired = Challenge::generate();

        test_challenges.1.issued.insert(
            test_expired.to_owned(),
            Utc::now() - Duration::seconds(301),
        );

        assert!(test_challenges.1.consume(&test_expired).is_none());

        test_challenges.1.issued.insert(
            test_expired.to_owned(),
            Utc::now() - Duration::seconds(301),
        );

        let test_fresh = test_challenges.1.issue();

        assert_eq!(test_challenges.1.issued.len(), 1);
        assert!(test_challenges.1.issued.contains_key(&test_fresh));

        Ok(())
    }

    #[tokio::test]
    async fn run() -> Result<(), Box<dyn std::error::Error>> {
        let (test_channel, mut test_challenges) = Challenges::init(300).await;

        let test_run = tokio::spawn(async move {
            test_challenges.run().await;
        });

        let test_issued = test_channel.issue().await?;

        assert_eq!(test_channel.consume(&test_issued).await?, test_issued);
        assert_eq!(
            test_channel.consume(&test_issued).await.unwrap_err().error,
            AuthenticationErrorType::ChallengeRejected,
        );
        assert_eq!(
            test_channel
                .consume(&Challenge::generate())
                .await
                .unwrap_err()
                .error,
            AuthenticationErrorType::ChallengeRejected,
        );

        drop(test_channel);

        assert!(test_run.await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn unavailable() -> Result<(), Box<dyn std::error::Error>> {
        let (test_channel, test_challenges) = Challenges::init(300).await;

        drop(test_challenges);

        assert_eq!(
            test_channel.issue().await.unwrap_err().error,
            AuthenticationErrorType::StoreUnavailable,
        );

        Ok(())
    }
}
