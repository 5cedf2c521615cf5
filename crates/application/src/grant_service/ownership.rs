use super::*;

impl GrantService {
    /// Transfers grant ownership and notifies both owners.
    pub async fn update_owner(&self, grant_id: &str, owner: &str, actor: &str) -> AppResult<Grant> {
        if owner.trim().is_empty() {
            return Err(GovernanceError::EmptyOwner.into());
        }

        let mut grant = self.get_by_id(grant_id).await?;
        let previous_owner = std::mem::replace(&mut grant.owner, owner.trim().to_owned());
        if previous_owner == grant.owner {
            return Ok(grant);
        }
        grant.updated_at = Utc::now();

        self.repository
            .update(&grant)
            .await
            .map_err(|error| persistence("updating grant owner", error))?;

        let notifications = [previous_owner.as_str(), grant.owner.as_str()]
            .into_iter()
            .map(|user| {
                Notification::for_grant(user, NotificationKind::GrantOwnerChanged, &grant)
                    .with_variable("previous_owner", json!(previous_owner))
                    .with_variable("new_owner", json!(grant.owner))
            })
            .collect();
        self.send_notifications(notifications).await;

        self.audit(
            AuditAction::GrantUpdate,
            json!({
                "grant_id": grant.id,
                "actor": actor,
                "previous_owner": previous_owner,
                "owner": grant.owner,
            }),
        )
        .await;

        Ok(grant)
    }
}
