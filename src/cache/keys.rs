pub fn session_result_key(session_id: &str) -> String {
    format!("placement:{}:result", session_id)
}

pub fn mastery_key(student_id: &str, skill_id: &str) -> String {
    format!("mastery:{}:{}", student_id, skill_id)
}
