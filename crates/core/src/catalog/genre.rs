#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Genre {
    pub label: &'static str,
    pub category_id: u32,
}

/// Genres offered in the picker, keyed by the catalog's category IDs.
pub const GENRES: &[Genre] = &[
    Genre { label: "소설/시/희곡", category_id: 1 },
    Genre { label: "장르소설", category_id: 112011 },
    Genre { label: "역사", category_id: 74 },
    Genre { label: "고전", category_id: 2105 },
    Genre { label: "과학", category_id: 987 },
    Genre { label: "사회", category_id: 798 },
    Genre { label: "자기계발", category_id: 336 },
    Genre { label: "청소년", category_id: 1137 },
    Genre { label: "종교", category_id: 1237 },
    Genre { label: "컴퓨터", category_id: 351 },
    Genre { label: "만화", category_id: 2551 },
    Genre { label: "경제", category_id: 170 },
];

pub fn find_genre(label: &str) -> Option<&'static Genre> {
    let label = label.trim();
    GENRES.iter().find(|genre| genre.label == label)
}
