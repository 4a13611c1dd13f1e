#![allow(dead_code)]

use std::time::Duration;

use chrono::Utc;
use db::{RestBackend, models::user::User, types::Role};
use tasks::{
    AuthService, HttpIdentityClient, Session, SessionKind, SessionStore, identity::AuthUser,
};
use test_support::FakeBackend;

pub struct Fixture {
    pub backend: FakeBackend,
    pub admin: User,
    pub alice: User,
    pub bob: User,
}

pub async fn fixture() -> Fixture {
    let backend = FakeBackend::start().await;
    let admin = backend.add_user("admin", Role::Admin);
    let alice = backend.add_user("alice", Role::User);
    let bob = backend.add_user("bob", Role::User);
    Fixture {
        backend,
        admin,
        alice,
        bob,
    }
}

pub fn rest_as(backend: &FakeBackend, user: &User) -> RestBackend {
    RestBackend::new(&backend.base_url(), backend.anon_key(), Duration::from_secs(5))
        .unwrap()
        .with_access_token(backend.access_token_for(user.id))
}

pub fn session_for(backend: &FakeBackend, user: &User) -> Session {
    Session {
        access_token: backend.access_token_for(user.id),
        refresh_token: backend.refresh_token_for(user.id),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        user: AuthUser {
            id: user.id,
            email: Some(user.email.clone()),
        },
        kind: SessionKind::SignedIn,
    }
}

pub fn auth_service(backend: &FakeBackend, session: Option<Session>) -> AuthService<HttpIdentityClient> {
    let identity =
        HttpIdentityClient::new(&backend.base_url(), backend.anon_key(), Duration::from_secs(5))
            .unwrap();
    AuthService::new(identity, SessionStore::new(session))
}
