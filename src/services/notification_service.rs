// src/services/notification_service.rs

use uuid::Uuid;

use crate::{
    db::NotificationRepository,
    models::notification::{NotificationDraft, UserRole},
};

/// Envio de notificações em regime de melhor esforço: falhas viram log,
/// nunca erro para quem chamou. Os métodos devolvem quantas foram gravadas.
#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository) -> Self {
        Self { repo }
    }

    pub async fn notify_user(&self, tenant_id: Uuid, user_id: Uuid, draft: &NotificationDraft) -> usize {
        match self.repo.insert(tenant_id, user_id, draft).await {
            Ok(_) => 1,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    kind = draft.kind.as_str(),
                    error = %e,
                    "Falha ao gravar notificação"
                );
                0
            }
        }
    }

    /// Notifica todos os usuários ativos do tenant com algum dos papéis.
    pub async fn notify_roles(&self, tenant_id: Uuid, roles: &[UserRole], draft: &NotificationDraft) -> usize {
        if roles.is_empty() {
            return 0;
        }

        let recipients = match self.repo.list_recipients(tenant_id, roles).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    roles = ?roles,
                    error = %e,
                    "Falha ao buscar destinatários"
                );
                return 0;
            }
        };

        let mut sent = 0;
        for user_id in recipients {
            sent += self.notify_user(tenant_id, user_id, draft).await;
        }
        sent
    }

    /// Notifica o usuário por trás de um vendedor.
    pub async fn notify_salesman(&self, tenant_id: Uuid, salesman_id: Uuid, draft: &NotificationDraft) -> usize {
        match self.repo.user_id_of_salesman(tenant_id, salesman_id).await {
            Ok(Some(user_id)) => self.notify_user(tenant_id, user_id, draft).await,
            Ok(None) => {
                tracing::warn!(tenant_id = %tenant_id, salesman_id = %salesman_id, "Vendedor sem usuário");
                0
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    salesman_id = %salesman_id,
                    error = %e,
                    "Falha ao resolver o usuário do vendedor"
                );
                0
            }
        }
    }
}
