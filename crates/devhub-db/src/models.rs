//! Row types as read from SQLite, kept apart from the records in
//! devhub-types.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct DocumentRow {
    pub path: String,
    pub data: String,
}
