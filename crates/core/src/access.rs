//! Role-scoped access rules.
//!
//! Row-level security lives here rather than in the database: every student
//! read, student write and message send is checked against the caller's role
//! and email before it reaches the repository.

use serde::{Deserialize, Serialize};

use crate::error::{CompassError, Result};
use crate::models::common::{normalize_email, Role};
use crate::models::student::{FieldGroup, Student, StudentUpdate};

/// The authenticated account a request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub role: Role,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl Caller {
    pub fn new(role: Role, email: &str) -> Self {
        Self {
            role,
            email: normalize_email(email),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

const STUDENT_GROUPS: &[FieldGroup] = &[
    FieldGroup::Contact,
    FieldGroup::Personal,
    FieldGroup::Passport,
    FieldGroup::Visa,
    FieldGroup::Family,
    FieldGroup::Education,
];

const STAFF_GROUPS: &[FieldGroup] = &[
    FieldGroup::Contact,
    FieldGroup::Personal,
    FieldGroup::Passport,
    FieldGroup::Visa,
    FieldGroup::Family,
    FieldGroup::Education,
    FieldGroup::Pipeline,
];

const SALES_GROUPS: &[FieldGroup] = &[FieldGroup::Contact, FieldGroup::Pipeline];

/// Field groups a role may write on a student it can see.
pub fn writable_groups(role: Role) -> &'static [FieldGroup] {
    match role {
        Role::Student => STUDENT_GROUPS,
        Role::Advisor | Role::Admin => STAFF_GROUPS,
        Role::Sales => SALES_GROUPS,
    }
}

/// Whether `caller` may see `student` at all.
pub fn can_read(caller: &Caller, student: &Student) -> bool {
    match caller.role {
        Role::Student => student.email == caller.email,
        Role::Advisor => student.advisor_email.as_deref() == Some(caller.email.as_str()),
        Role::Admin | Role::Sales => true,
    }
}

/// Fail with `NotFound` when the student is outside the caller's read scope,
/// so existence is not leaked.
pub fn require_read(caller: &Caller, student: &Student) -> Result<()> {
    if can_read(caller, student) {
        Ok(())
    } else {
        Err(CompassError::NotFound(format!("student {}", student.email)))
    }
}

/// Check that every field in `update` is in a group the caller may write.
pub fn check_write(caller: &Caller, student: &Student, update: &StudentUpdate) -> Result<()> {
    require_read(caller, student)?;
    let allowed = writable_groups(caller.role);
    for (spec, _) in update.changes() {
        if !allowed.contains(&spec.group) {
            return Err(CompassError::Forbidden(format!(
                "{} may not modify field {}",
                caller.role, spec.name
            )));
        }
    }
    Ok(())
}

/// Fail with `Forbidden` unless the caller has one of `roles`.
pub fn require_role(caller: &Caller, roles: &[Role]) -> Result<()> {
    if roles.contains(&caller.role) {
        Ok(())
    } else {
        Err(CompassError::Forbidden(format!(
            "{} may not perform this action",
            caller.role
        )))
    }
}

pub fn require_admin(caller: &Caller) -> Result<()> {
    require_role(caller, &[Role::Admin])
}

/// Roles that may create student records on someone else's behalf.
pub fn can_create_students(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Sales)
}

/// Whether a message from `sender` to `receiver` is permitted.
///
/// `student_advisor` is the advisor email of whichever side is the student,
/// when one side is a student and the other an advisor.
pub fn can_message(sender: &Caller, receiver: &Caller, student_advisor: Option<&str>) -> bool {
    match (sender.role, receiver.role) {
        (Role::Admin, _) | (_, Role::Admin) => true,
        (Role::Student, Role::Advisor) => student_advisor == Some(receiver.email.as_str()),
        (Role::Advisor, Role::Student) => student_advisor == Some(sender.email.as_str()),
        (Role::Sales, Role::Student) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::student::{StudentProfile, DEFAULT_STAGE};
    use chrono::Utc;

    fn student(email: &str, advisor: Option<&str>) -> Student {
        Student {
            id: 1,
            email: email.into(),
            first_name: "Lina".into(),
            last_name: "Farouk".into(),
            phone: None,
            stage: DEFAULT_STAGE.into(),
            process_started: false,
            advisor_email: advisor.map(String::from),
            advisor_id: None,
            profile: StudentProfile::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn update(field: &str) -> StudentUpdate {
        let mut u = StudentUpdate::new();
        if field == "process_started" {
            u.set_flag(field, true).unwrap();
        } else {
            u.set_text(field, Some("x".into())).unwrap();
        }
        u
    }

    #[test]
    fn caller_email_is_normalized() {
        let caller = Caller::new(Role::Advisor, " Sam@Compass.Example ");
        assert_eq!(caller.email, "sam@compass.example");
        assert!(caller.is(Role::Advisor));
    }

    #[test]
    fn student_reads_only_self() {
        let me = Caller::new(Role::Student, "lina@example.com");
        assert!(can_read(&me, &student("lina@example.com", None)));
        assert!(!can_read(&me, &student("omar@example.com", None)));
    }

    #[test]
    fn advisor_reads_only_assigned() {
        let adv = Caller::new(Role::Advisor, "sam@compass.example");
        assert!(can_read(&adv, &student("a@x.io", Some("sam@compass.example"))));
        assert!(!can_read(&adv, &student("a@x.io", Some("kim@compass.example"))));
        assert!(!can_read(&adv, &student("a@x.io", None)));
    }

    #[test]
    fn admin_and_sales_read_all() {
        let s = student("a@x.io", None);
        assert!(can_read(&Caller::new(Role::Admin, "root@c.io"), &s));
        assert!(can_read(&Caller::new(Role::Sales, "lee@c.io"), &s));
    }

    #[test]
    fn out_of_scope_read_is_not_found() {
        let me = Caller::new(Role::Student, "lina@example.com");
        let err = require_read(&me, &student("omar@example.com", None)).unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
    }

    #[test]
    fn student_cannot_write_pipeline() {
        let me = Caller::new(Role::Student, "lina@example.com");
        let s = student("lina@example.com", None);
        assert!(check_write(&me, &s, &update("passport_number")).is_ok());
        let err = check_write(&me, &s, &update("stage")).unwrap_err();
        assert!(matches!(err, CompassError::Forbidden(_)));
        assert!(err.to_string().contains("stage"));
        assert!(check_write(&me, &s, &update("process_started")).is_err());
    }

    #[test]
    fn sales_writes_contact_and_pipeline_only() {
        let sales = Caller::new(Role::Sales, "lee@c.io");
        let s = student("a@x.io", None);
        assert!(check_write(&sales, &s, &update("phone")).is_ok());
        assert!(check_write(&sales, &s, &update("stage")).is_ok());
        assert!(check_write(&sales, &s, &update("visa_status")).is_err());
    }

    #[test]
    fn advisor_writes_everything_on_own_student() {
        let adv = Caller::new(Role::Advisor, "sam@compass.example");
        let own = student("a@x.io", Some("sam@compass.example"));
        assert!(check_write(&adv, &own, &update("stage")).is_ok());
        assert!(check_write(&adv, &own, &update("mother_name")).is_ok());

        let other = student("b@x.io", None);
        let err = check_write(&adv, &other, &update("city")).unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
    }

    #[test]
    fn require_role_rejects_others() {
        let sales = Caller::new(Role::Sales, "lee@c.io");
        assert!(require_admin(&sales).is_err());
        assert!(require_role(&sales, &[Role::Admin, Role::Sales]).is_ok());
        assert!(can_create_students(Role::Sales));
        assert!(!can_create_students(Role::Advisor));
    }

    #[test]
    fn messaging_matrix() {
        let stu = Caller::new(Role::Student, "lina@example.com");
        let adv = Caller::new(Role::Advisor, "sam@compass.example");
        let other_adv = Caller::new(Role::Advisor, "kim@compass.example");
        let admin = Caller::new(Role::Admin, "root@compass.example");
        let sales = Caller::new(Role::Sales, "lee@compass.example");
        let link = Some("sam@compass.example");

        assert!(can_message(&stu, &adv, link));
        assert!(!can_message(&stu, &other_adv, link));
        assert!(can_message(&stu, &admin, None));
        assert!(!can_message(&stu, &sales, None));

        assert!(can_message(&adv, &stu, link));
        assert!(!can_message(&other_adv, &stu, link));
        assert!(can_message(&adv, &admin, None));
        assert!(!can_message(&adv, &sales, None));

        assert!(can_message(&admin, &sales, None));
        assert!(can_message(&admin, &stu, None));

        assert!(can_message(&sales, &stu, None));
        assert!(can_message(&sales, &admin, None));
        assert!(!can_message(&sales, &adv, None));
    }
}
