use chess_core::Side;
use sqlx::PgPool;

use crate::error::AppError;

/// Stored form of a study URL, whatever chapter or query the user pasted.
pub fn canonical_study_url(study_id: &str) -> String {
    format!("https://lichess.org/study/{study_id}")
}

/// Make `study_id` the user's active `color` repertoire and return its row
/// id. Any other study active for that color is deactivated.
pub async fn register_study(
    pool: &PgPool,
    user_id: i64,
    study_id: &str,
    color: Side,
) -> Result<i64, AppError> {
    let url = canonical_study_url(study_id);
    let mut tx = pool.begin().await.map_err(AppError::Sqlx)?;

    sqlx::query(
        r#"UPDATE lichess_studies SET is_active = FALSE
           WHERE user_id = $1 AND color = $2 AND study_url <> $3 AND is_active"#,
    )
    .bind(user_id)
    .bind(color.as_str())
    .bind(&url)
    .execute(&mut *tx)
    .await
    .map_err(AppError::Sqlx)?;

    let (id,): (i64,) = sqlx::query_as(
        r#"INSERT INTO lichess_studies (user_id, study_url, color)
           VALUES ($1, $2, $3)
           ON CONFLICT (user_id, study_url, color) DO UPDATE SET is_active = TRUE
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(&url)
    .bind(color.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(AppError::Sqlx)?;

    tx.commit().await.map_err(AppError::Sqlx)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::lichess::extract_study_id;

    #[test]
    fn test_chapter_links_share_one_study_url() {
        let pasted = [
            "https://lichess.org/study/AbC123xY",
            "https://lichess.org/study/AbC123xY/chapter9",
            "lichess.org/study/AbC123xY?ref=share",
        ];
        for url in pasted {
            let id = extract_study_id(url).unwrap();
            assert_eq!(canonical_study_url(&id), "https://lichess.org/study/AbC123xY");
        }
    }
}
