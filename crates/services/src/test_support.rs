//! In-memory repository and mailer implementations for tests.
//!
//! These mirror the transactional semantics the Postgres repositories
//! provide (conditional status transitions, last-admin re-checks, unique
//! constraints) so domain logic can be exercised without a database. They
//! are exposed to downstream crates through the `test-support` feature.

use crate::auth::ports::{SessionRepository, User, UserId, UserRepository};
use crate::common::{generate_invitation_token, hash_token, RepositoryError};
use crate::email::{Email, EmailError, Mailer};
use crate::invitation::ports::{
    CreateInvitationRequest, Invitation, InvitationRepository, InvitationStatus,
    InvitationWithNames,
};
use crate::organization::ports::{
    CreateOrganizationRequest, MemberRole, Membership, MembershipId, MembershipWithUser,
    Organization, OrganizationId, OrganizationRepository, OrganizationWithRole,
    UpdateOrganizationRequest,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Build a standalone user value
pub fn test_user(email: &str, display_name: Option<&str>) -> User {
    let now = Utc::now();
    User {
        id: UserId(Uuid::new_v4()),
        email: email.to_string(),
        display_name: display_name.map(|s| s.to_string()),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, as the identity provider would on sign-up
    pub fn seed_user(&self, email: &str, display_name: Option<&str>) -> User {
        let user = test_user(email, display_name);
        self.users.lock().unwrap().insert(user.id.0, user.clone());
        user
    }

    fn get_sync(&self, id: UserId) -> Option<User> {
        self.users.lock().unwrap().get(&id.0).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.get_sync(id))
    }

    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_display_name(
        &self,
        id: UserId,
        display_name: Option<String>,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        Ok(users.get_mut(&id.0).map(|user| {
            user.display_name = display_name;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<String, User>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a bearer token with a user
    pub fn seed_session(&self, token: &str, user: &User) {
        self.sessions
            .lock()
            .unwrap()
            .insert(hash_token(token), user.clone());
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_user_by_token_hash(&self, token_hash: &str) -> anyhow::Result<Option<User>> {
        Ok(self.sessions.lock().unwrap().get(token_hash).cloned())
    }
}

#[derive(Default)]
struct OrgState {
    organizations: HashMap<Uuid, Organization>,
    memberships: HashMap<Uuid, Membership>,
}

pub struct InMemoryOrganizationRepository {
    state: Mutex<OrgState>,
    users: Option<std::sync::Arc<InMemoryUserRepository>>,
}

impl InMemoryOrganizationRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OrgState::default()),
            users: None,
        }
    }

    /// Attach a user repository so member listings carry real user data
    pub fn with_users(users: std::sync::Arc<InMemoryUserRepository>) -> Self {
        Self {
            state: Mutex::new(OrgState::default()),
            users: Some(users),
        }
    }

    fn admin_count_locked(state: &OrgState, organization_id: OrganizationId) -> i64 {
        state
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id && m.role == MemberRole::Admin)
            .count() as i64
    }

    fn add_member_locked(
        state: &mut OrgState,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError> {
        if !state.organizations.contains_key(&organization_id.0) {
            return Err(RepositoryError::ForeignKeyViolation(
                "organization".to_string(),
            ));
        }
        if state
            .memberships
            .values()
            .any(|m| m.organization_id == organization_id && m.user_id == user_id)
        {
            return Err(RepositoryError::AlreadyExists);
        }

        let membership = Membership {
            id: MembershipId(Uuid::new_v4()),
            organization_id,
            user_id,
            role,
            created_at: Utc::now(),
        };
        state
            .memberships
            .insert(membership.id.0, membership.clone());
        Ok(membership)
    }

    fn member_email(&self, user_id: UserId) -> (String, Option<String>) {
        match self.users.as_ref().and_then(|u| u.get_sync(user_id)) {
            Some(user) => (user.email, user.display_name),
            None => (format!("{}@example.com", user_id.0), None),
        }
    }

    fn organization_name_sync(&self, organization_id: OrganizationId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .organizations
            .get(&organization_id.0)
            .map(|o| o.name.clone())
    }

    fn accept_membership_sync(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::add_member_locked(&mut state, organization_id, user_id, role)
    }
}

impl Default for InMemoryOrganizationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrganizationRepository for InMemoryOrganizationRepository {
    async fn create(
        &self,
        request: CreateOrganizationRequest,
        creator: UserId,
    ) -> Result<(Organization, Membership), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let slug = request
            .slug
            .ok_or_else(|| RepositoryError::RequiredFieldMissing("slug".to_string()))?;

        if state.organizations.values().any(|o| o.slug == slug) {
            return Err(RepositoryError::AlreadyExists);
        }

        let now = Utc::now();
        let org = Organization {
            id: OrganizationId(Uuid::new_v4()),
            name: request.name,
            slug,
            logo: request.logo,
            created_at: now,
            updated_at: now,
        };
        state.organizations.insert(org.id.0, org.clone());
        let membership =
            Self::add_member_locked(&mut state, org.id, creator, MemberRole::Admin)?;
        Ok((org, membership))
    }

    async fn get_by_id(&self, id: OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        Ok(self.state.lock().unwrap().organizations.get(&id.0).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .organizations
            .values()
            .find(|o| o.slug == slug)
            .cloned())
    }

    async fn update(
        &self,
        id: OrganizationId,
        request: UpdateOrganizationRequest,
    ) -> Result<Organization, RepositoryError> {
        let mut state = self.state.lock().unwrap();

        if let Some(ref slug) = request.slug {
            if state
                .organizations
                .values()
                .any(|o| o.slug == *slug && o.id != id)
            {
                return Err(RepositoryError::AlreadyExists);
            }
        }

        let org = state
            .organizations
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound("organization".to_string()))?;

        if let Some(name) = request.name {
            org.name = name;
        }
        if let Some(slug) = request.slug {
            org.slug = slug;
        }
        if let Some(logo) = request.logo {
            org.logo = Some(logo);
        }
        org.updated_at = Utc::now();
        Ok(org.clone())
    }

    async fn delete(&self, id: OrganizationId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let removed = state.organizations.remove(&id.0).is_some();
        if removed {
            state.memberships.retain(|_, m| m.organization_id != id);
        }
        Ok(removed)
    }

    async fn get_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<Membership>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .values()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned())
    }

    async fn get_member_by_id(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<Option<Membership>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .get(&member_id.0)
            .filter(|m| m.organization_id == organization_id)
            .cloned())
    }

    async fn add_member(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::add_member_locked(&mut state, organization_id, user_id, role)
    }

    async fn update_member_role(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
        role: MemberRole,
    ) -> Result<Membership, RepositoryError> {
        let mut state = self.state.lock().unwrap();

        let current = state
            .memberships
            .get(&member_id.0)
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound("organization member".to_string()))?;

        if current.role == MemberRole::Admin
            && role != MemberRole::Admin
            && Self::admin_count_locked(&state, organization_id) <= 1
        {
            return Err(RepositoryError::ValidationFailed(
                "organization would be left without an admin".to_string(),
            ));
        }

        let membership = state.memberships.get_mut(&member_id.0).unwrap();
        membership.role = role;
        Ok(membership.clone())
    }

    async fn remove_member(
        &self,
        organization_id: OrganizationId,
        member_id: MembershipId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();

        let Some(current) = state
            .memberships
            .get(&member_id.0)
            .filter(|m| m.organization_id == organization_id)
            .cloned()
        else {
            return Ok(false);
        };

        if current.role == MemberRole::Admin
            && Self::admin_count_locked(&state, organization_id) <= 1
        {
            return Err(RepositoryError::ValidationFailed(
                "organization would be left without an admin".to_string(),
            ));
        }

        state.memberships.remove(&member_id.0);
        Ok(true)
    }

    async fn list_members(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<MembershipWithUser>, RepositoryError> {
        let memberships: Vec<Membership> = {
            let state = self.state.lock().unwrap();
            let mut members: Vec<Membership> = state
                .memberships
                .values()
                .filter(|m| m.organization_id == organization_id)
                .cloned()
                .collect();
            members.sort_by_key(|m| m.created_at);
            members
        };

        Ok(memberships
            .into_iter()
            .map(|membership| {
                let (email, display_name) = self.member_email(membership.user_id);
                MembershipWithUser {
                    membership,
                    email,
                    display_name,
                }
            })
            .collect())
    }

    async fn admin_count(&self, organization_id: OrganizationId) -> Result<i64, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(Self::admin_count_locked(&state, organization_id))
    }

    async fn list_organizations_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrganizationWithRole>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut memberships: Vec<&Membership> = state
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .collect();
        memberships.sort_by_key(|m| std::cmp::Reverse(m.created_at));

        Ok(memberships
            .into_iter()
            .filter_map(|m| {
                state
                    .organizations
                    .get(&m.organization_id.0)
                    .map(|org| OrganizationWithRole {
                        organization: org.clone(),
                        role: m.role,
                    })
            })
            .collect())
    }

    async fn count_memberships_for_user(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .count() as i64)
    }

    async fn most_recent_membership(
        &self,
        user_id: UserId,
    ) -> Result<Option<Membership>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }
}

pub struct InMemoryInvitationRepository {
    invitations: Mutex<HashMap<Uuid, Invitation>>,
    organizations: std::sync::Arc<InMemoryOrganizationRepository>,
    users: std::sync::Arc<InMemoryUserRepository>,
}

impl InMemoryInvitationRepository {
    pub fn new(
        organizations: std::sync::Arc<InMemoryOrganizationRepository>,
        users: std::sync::Arc<InMemoryUserRepository>,
    ) -> Self {
        Self {
            invitations: Mutex::new(HashMap::new()),
            organizations,
            users,
        }
    }

    fn with_names(&self, invitation: Invitation) -> InvitationWithNames {
        let organization_name = self
            .organizations
            .organization_name_sync(invitation.organization_id)
            .unwrap_or_default();
        let inviter_name = self
            .users
            .get_sync(invitation.invited_by)
            .map(|u| u.name().to_string());
        InvitationWithNames {
            invitation,
            organization_name,
            inviter_name,
        }
    }
}

#[async_trait]
impl InvitationRepository for InMemoryInvitationRepository {
    async fn create(
        &self,
        organization_id: OrganizationId,
        request: CreateInvitationRequest,
        invited_by: UserId,
    ) -> Result<Invitation, RepositoryError> {
        let now = Utc::now();
        let invitation = Invitation {
            id: Uuid::new_v4(),
            organization_id,
            email: request.email,
            role: request.role,
            invited_by,
            token: generate_invitation_token(),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(request.expires_in_days),
            accepted_at: None,
        };
        self.invitations
            .lock()
            .unwrap()
            .insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Invitation>, RepositoryError> {
        Ok(self.invitations.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Invitation>, RepositoryError> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .find(|i| i.token == token)
            .cloned())
    }

    async fn find_pending(
        &self,
        organization_id: OrganizationId,
        email: &str,
    ) -> Result<Option<Invitation>, RepositoryError> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .find(|i| {
                i.organization_id == organization_id
                    && i.email == email
                    && i.status == InvitationStatus::Pending
            })
            .cloned())
    }

    async fn accept(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<(Invitation, Membership), RepositoryError> {
        // Conditional transition first; only a pending invitation can win
        let pending = {
            let invitations = self.invitations.lock().unwrap();
            let invitation = invitations
                .get(&id)
                .ok_or_else(|| RepositoryError::NotFound("invitation".to_string()))?;
            if invitation.status != InvitationStatus::Pending {
                return Err(RepositoryError::NotFound("pending invitation".to_string()));
            }
            invitation.clone()
        };

        let membership = self.organizations.accept_membership_sync(
            pending.organization_id,
            user_id,
            pending.role,
        )?;

        let mut invitations = self.invitations.lock().unwrap();
        let invitation = invitations
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound("invitation".to_string()))?;
        invitation.status = InvitationStatus::Accepted;
        invitation.accepted_at = Some(Utc::now());
        Ok((invitation.clone(), membership))
    }

    async fn expire(&self, id: Uuid) -> Result<Option<Invitation>, RepositoryError> {
        let mut invitations = self.invitations.lock().unwrap();
        match invitations.get_mut(&id) {
            Some(invitation) if invitation.status == InvitationStatus::Pending => {
                invitation.status = InvitationStatus::Expired;
                Ok(Some(invitation.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_pending_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<InvitationWithNames>, RepositoryError> {
        let mut pending: Vec<Invitation> = self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| {
                i.organization_id == organization_id && i.status == InvitationStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(pending.into_iter().map(|i| self.with_names(i)).collect())
    }

    async fn list_pending_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<InvitationWithNames>, RepositoryError> {
        let mut pending: Vec<Invitation> = self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.email == email && i.status == InvitationStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(pending.into_iter().map(|i| self.with_names(i)).collect())
    }

    async fn mark_lapsed_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut count = 0;
        for invitation in self.invitations.lock().unwrap().values_mut() {
            if invitation.organization_id == organization_id && invitation.is_lapsed(now) {
                invitation.status = InvitationStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn mark_lapsed_for_email(&self, email: &str) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut count = 0;
        for invitation in self.invitations.lock().unwrap().values_mut() {
            if invitation.email == email && invitation.is_lapsed(now) {
                invitation.status = InvitationStatus::Expired;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Mailer that records sent emails for assertions
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
