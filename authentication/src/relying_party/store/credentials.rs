use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

use crate::authenticator::data::SignCount;
use crate::error::{AuthenticationError, AuthenticationErrorType};
use crate::relying_party::credential::PublicKeyCredential;

pub type CredentialId = Vec<u8>;

#[derive(Debug)]
pub enum Request {
    Insert(Box<PublicKeyCredential>),
    FindById(CredentialId),
    UpdateSignCount {
        credential_id: CredentialId,
        expected: SignCount,
        new: SignCount,
    },
    Remove(CredentialId),
}

#[derive(Debug)]
pub enum Response {
    Credential(Box<PublicKeyCredential>),
    Stored,
    NotFound,
    Conflict,
}

#[derive(Clone)]
pub struct CredentialsChannel {
    sender: mpsc::Sender<(Request, oneshot::Sender<Response>)>,
}

impl CredentialsChannel {
    pub async fn init() -> (
        CredentialsChannel,
        mpsc::Receiver<(Request, oneshot::Sender<Response>)>,
    ) {
        let (sender, receiver) = mpsc::channel(64);

        (CredentialsChannel { sender }, receiver)
    }

    /// Stores a newly registered credential. Fails if the id is taken.
    pub async fn insert(&self, credential: PublicKeyCredential) -> Result<(), AuthenticationError> {
        match self.request(Request::Insert(Box::new(credential))).await? {
            Response::Stored => Ok(()),
            response => Err(unexpected(response)),
        }
    }

    pub async fn find_by_id(
        &self,
        credential_id: &[u8],
    ) -> Result<PublicKeyCredential, AuthenticationError> {
        match self
            .request(Request::FindById(credential_id.to_vec()))
            .await?
        {
            Response::Credential(credential) => Ok(*credential),
            response => Err(unexpected(response)),
        }
    }

    /// Compare and swap: the count is only written while the stored value is
    /// still `expected`, so two assertions racing on the same credential
    /// cannot both be persisted.
    pub async fn update_sign_count(
        &self,
        credential_id: &[u8],
        expected: SignCount,
        new: SignCount,
    ) -> Result<(), AuthenticationError> {
        match self
            .request(Request::UpdateSignCount {
                credential_id: credential_id.to_vec(),
                expected,
                new,
            })
            .await?
        {
            Response::Stored => Ok(()),
            response => Err(unexpected(response)),
        }
    }

    pub async fn remove(&self, credential_id: &[u8]) -> Result<(), AuthenticationError> {
        match self
            .request(Request::Remove(credential_id.to_vec()))
            .await?
        {
            Response::Stored => Ok(()),
            response => Err(unexpected(response)),
        }
    }

    async fn request(&self, request: Request) -> Result<Response, AuthenticationError> {
        let (sender, receiver) = oneshot::channel();
        let unavailable = AuthenticationError {
            error: AuthenticationErrorType::StoreUnavailable,
        };

        if let Err(error) = self.sender.send((request, sender)).await {
            log::error!("credentials channel | send -> {}", error);

            return Err(unavailable);
        }

        match receiver.await {
            Ok(response) => Ok(response),
            Err(error) => {
                log::error!("credentials channel | receive -> {}", error);

                Err(unavailable)
            }
        }
    }
}

fn unexpected(response: Response) -> AuthenticationError {
    let error = match response {
        Response::NotFound => AuthenticationErrorType::UnknownCredential,
        Response::Conflict => AuthenticationErrorType::CredentialConflict,
        Response::Credential(_) | Response::Stored => AuthenticationErrorType::StoreUnavailable,
    };

    AuthenticationError { error }
}

pub struct Credentials {
    credentials: HashMap<CredentialId, PublicKeyCredential>,
    receiver: mpsc::Receiver<(Request, oneshot::Sender<Response>)>,
}

impl Credentials {
    pub async fn init() -> (CredentialsChannel, Credentials) {
        let credentials = HashMap::with_capacity(50);
        let (credentials_channel, receiver) = CredentialsChannel::init().await;

        (
            credentials_channel,
            Credentials {
                credentials,
                receiver,
            },
        )
    }

    pub async fn run(&mut self) {
        while let Some((request, response)) = self.receiver.recv().await {
            let outcome = match request {
                Request::Insert(credential) => self.insert(*credential),
                Request::FindById(credential_id) => self.find_by_id(&credential_id),
                Request::UpdateSignCount {
                    credential_id,
                    expected,
                    new,
                } => self.update_sign_count(&credential_id, expected, new),
                Request::Remove(credential_id) => self.remove(&credential_id),
            };

            let _ = response.send(outcome);
        }
    }

    fn insert(&mut self, credential: PublicKeyCredential) -> Response {
        match self.credentials.contains_key(credential.id()) {
            true => {
                log::warn!("credentials | duplicate credential id rejected");

                Response::Conflict
            }
            false => {
                self.credentials
                    .insert(credential.id().to_vec(), credential);

                Response::Stored
            }
        }
    }

    fn find_by_id(&self, credential_id: &[u8]) -> Response {
        match self.credentials.get(credential_id) {
            Some(credential) => Response::Credential(Box::new(credential.to_owned())),
            None => Response::NotFound,
        }
    }

    fn update_sign_count(
        &mut self,
        credential_id: &[u8],
        expected: SignCount,
        new: SignCount,
    ) -> Response {
        let stored = match self.credentials.get_mut(credential_id) {
            Some(stored) => stored,
            None => return Response::NotFound,
        };

        match stored.sign_count() == expected {
            true => {
                *stored = PublicKeyCredential::restore(
                    stored.id().to_vec(),
                    stored.public_key().to_owned(),
                    new,
                    stored.transports().to_owned(),
                    stored.owner(),
                    stored.attestation_format().to_owned(),
                );

                Response::Stored
            }
            false => {
                log::warn!(
                    "credentials | stale sign count update for {} (expected {}, stored {})",
                    stored.owner(),
                    expected,
                    stored.sign_count(),
                );

                Response::Conflict
            }
        }
    }

    fn remove(&mut self, credential_id: &[u8]) -> Response {
        match self.credentials.remove(credential_id) {
            Some(_) => Response::Stored,
            None => Response::NotFound,
        }
    }
}
