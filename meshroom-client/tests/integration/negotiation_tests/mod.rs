mod test_candidate_ordering;
mod test_glare_resolution;
mod test_two_participants_connect;
