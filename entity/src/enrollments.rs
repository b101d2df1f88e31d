use super::sea_orm_active_enums::EnrollmentStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: EnrollmentStatus,
    /// 1 while this enrollment holds a reserved credit, otherwise 0
    pub credits_reserved: i16,
    pub created_at: TimeDateTimeWithTimeZone,
    pub cancelled_at: Option<TimeDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tutoring_sessions::Entity",
        from = "Column::SessionId",
        to = "super::tutoring_sessions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    TutoringSessions,
}

impl Related<super::tutoring_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TutoringSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
